use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use byteorder::{ByteOrder, LittleEndian};

use super::document::{Accessor, Buffer, BufferView, FLOAT, UNSIGNED_SHORT};
use crate::retarget::math::{Quat, Vec3};
use crate::skeleton::Bone;

/// シーングラフ内の位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    /// 合成ルートは None
    pub bone: Option<Bone>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// 添字で親子を持つシーングラフ。追加順がそのまま glTF のノード番号になる。
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, bone: Option<Bone>, parent: Option<NodeId>, translation: Vec3, rotation: Quat) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode {
            name: name.to_string(),
            bone,
            parent,
            children: Vec::new(),
            translation,
            rotation,
        });
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(p.0)) {
            p.children.push(id);
        }
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn find(&self, bone: Bone) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.bone == Some(bone)).map(NodeId)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// ボーンに対応するノードだけ
    pub fn joints(&self) -> impl Iterator<Item = (NodeId, Bone, &SceneNode)> {
        self.iter().filter_map(|(id, n)| n.bone.map(|b| (id, b, n)))
    }
}

fn component_bounds<const N: usize>(values: &[[f32; N]]) -> (Vec<f32>, Vec<f32>) {
    let mut min = vec![f32::INFINITY; N];
    let mut max = vec![f32::NEG_INFINITY; N];
    for v in values {
        for (i, c) in v.iter().enumerate() {
            min[i] = min[i].min(*c);
            max[i] = max[i].max(*c);
        }
    }
    if values.is_empty() {
        return (vec![0.0; N], vec![0.0; N]);
    }
    (min, max)
}

/// 1 本のバッファへ 4 バイト境界で詰めていく
#[derive(Debug, Default)]
pub struct BufferPacker {
    data: Vec<u8>,
    views: Vec<BufferView>,
    accessors: Vec<Accessor>,
}

impl BufferPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// bufferView を 1 つ追加してその番号を返す
    pub fn push_bytes(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        let byte_offset = self.data.len();
        self.data.extend_from_slice(bytes);
        let padded = self.data.len().next_multiple_of(4);
        self.data.resize(padded, 0);
        self.views.push(BufferView {
            buffer: 0,
            byte_offset,
            byte_length: bytes.len(),
            target,
        });
        self.views.len() - 1
    }

    pub fn push_f32s(&mut self, values: &[f32], target: Option<u32>) -> usize {
        let mut bytes = vec![0u8; values.len() * 4];
        LittleEndian::write_f32_into(values, &mut bytes);
        self.push_bytes(&bytes, target)
    }

    pub fn push_u16s(&mut self, values: &[u16], target: Option<u32>) -> usize {
        let mut bytes = vec![0u8; values.len() * 2];
        LittleEndian::write_u16_into(values, &mut bytes);
        self.push_bytes(&bytes, target)
    }

    fn accessor(&mut self, accessor: Accessor) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    /// float の要素列（SCALAR / VEC3 / VEC4）。min/max 付き。
    pub fn floats<const N: usize>(&mut self, values: &[[f32; N]], target: Option<u32>) -> usize {
        let flat: Vec<f32> = values.iter().flatten().copied().collect();
        let view = self.push_f32s(&flat, target);
        let (min, max) = component_bounds(values);
        let kind = match N {
            1 => "SCALAR",
            2 => "VEC2",
            3 => "VEC3",
            4 => "VEC4",
            _ => "MAT4",
        };
        self.accessor(Accessor {
            buffer_view: view,
            component_type: FLOAT,
            count: values.len(),
            kind: kind.to_string(),
            min,
            max,
        })
    }

    pub fn indices(&mut self, values: &[u16], target: Option<u32>) -> usize {
        let view = self.push_u16s(values, target);
        let min = values.iter().copied().min().unwrap_or(0) as f32;
        let max = values.iter().copied().max().unwrap_or(0) as f32;
        self.accessor(Accessor {
            buffer_view: view,
            component_type: UNSIGNED_SHORT,
            count: values.len(),
            kind: "SCALAR".to_string(),
            min: vec![min],
            max: vec![max],
        })
    }

    /// 単位行列 count 個の MAT4
    pub fn identity_matrices(&mut self, count: usize) -> usize {
        #[rustfmt::skip]
        const IDENTITY: [f32; 16] = [
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        let flat: Vec<f32> = (0..count).flat_map(|_| IDENTITY).collect();
        let view = self.push_f32s(&flat, None);
        self.accessor(Accessor {
            buffer_view: view,
            component_type: FLOAT,
            count,
            kind: "MAT4".to_string(),
            min: Vec::new(),
            max: Vec::new(),
        })
    }

    /// data URI で埋め込んだバッファと、views / accessors を返す
    pub fn finish(self) -> (Buffer, Vec<BufferView>, Vec<Accessor>) {
        let buffer = Buffer {
            byte_length: self.data.len(),
            uri: format!("data:application/octet-stream;base64,{}", STANDARD.encode(&self.data)),
        };
        (buffer, self.views, self.accessors)
    }
}
