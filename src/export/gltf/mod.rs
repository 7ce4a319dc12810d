//! glTF 2.0（JSON + base64 埋め込みバッファ）の書き出し
//!
//! 現在のポーズで組んだボーン階層を線メッシュで可視化し、
//! キーフレーム列を各ボーンの translation / rotation チャンネルにする。

pub mod builder;
pub mod document;
pub mod hierarchy;

use tracing::info;

use crate::config::ExportConfig;
use crate::export::ExportError;
use crate::keyframe::KeyFrame;
use crate::retarget::math::{quat_from_array, quat_to_array};
use crate::skeleton::{BoneMap, Skeleton};

use builder::{BufferPacker, SceneGraph};
use document::*;
use hierarchy::Region;

pub use builder::{NodeId, SceneNode};
pub use hierarchy::{build_graph, SCENE_ROOT};

pub const GENERATOR: &str = "Akira Motion Exporter";
pub const COPYRIGHT: &str = "Akira Motion Capture";
pub const ANIMATION_NAME: &str = "AkiraMotion";
pub const SKIN_NAME: &str = "AkiraSkeleton";

fn vec3(v: &crate::retarget::math::Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// ノードごとの線（点）メッシュを作り、ノード番号 → メッシュ番号を返す
fn build_meshes(graph: &SceneGraph, packer: &mut BufferPacker) -> (Vec<Mesh>, Vec<Option<usize>>) {
    let mut meshes = Vec::new();
    let mut node_meshes = vec![None; graph.len()];

    for (id, bone, node) in graph.joints() {
        // 親がボーンなら親から自分への線、ルートボーンは点
        let parent = node.parent.and_then(|p| graph.get(p)).filter(|p| p.bone.is_some());
        let primitive = match parent {
            Some(parent) => {
                let position = packer.floats(&[vec3(&parent.translation), vec3(&node.translation)], Some(ARRAY_BUFFER));
                let indices = packer.indices(&[0, 1], Some(ELEMENT_ARRAY_BUFFER));
                Primitive {
                    attributes: Attributes { position },
                    indices: Some(indices),
                    mode: MODE_LINES,
                    material: Region::of(bone).index(),
                }
            }
            None => {
                let position = packer.floats(&[[0.0; 3]], Some(ARRAY_BUFFER));
                Primitive {
                    attributes: Attributes { position },
                    indices: None,
                    mode: MODE_POINTS,
                    material: Region::Bone.index(),
                }
            }
        };
        node_meshes[id.0] = Some(meshes.len());
        meshes.push(Mesh {
            name: format!("{}_mesh", node.name),
            primitives: vec![primitive],
        });
    }
    (meshes, node_meshes)
}

/// ボーンごとの値列。そのフレームに無ければ直前の値、最初のキーより前はノードのレスト値を使う。
fn sample_tracks(frames: &[KeyFrame], node: &SceneNode) -> (Vec<[f32; 3]>, Vec<[f32; 4]>) {
    let mut positions = Vec::with_capacity(frames.len());
    let mut rotations = Vec::with_capacity(frames.len());
    let mut last_position = vec3(&node.translation);
    let mut last_rotation = quat_to_array(&node.rotation);
    for frame in frames {
        if let Some(key) = frame.bone(&node.name) {
            last_position = key.position;
            last_rotation = quat_to_array(&quat_from_array(key.rotation));
        }
        positions.push(last_position);
        rotations.push(last_rotation);
    }
    (positions, rotations)
}

fn build_animation(graph: &SceneGraph, frames: &[KeyFrame], frame_rate: f32, packer: &mut BufferPacker) -> Animation {
    let times: Vec<[f32; 1]> = (0..frames.len()).map(|i| [i as f32 / frame_rate]).collect();
    let input = packer.floats(&times, None);

    let mut channels = Vec::new();
    let mut samplers = Vec::new();
    for (id, _, node) in graph.joints() {
        let (positions, rotations) = sample_tracks(frames, node);
        for (path, output) in [
            ("translation", packer.floats(&positions, None)),
            ("rotation", packer.floats(&rotations, None)),
        ] {
            channels.push(Channel {
                sampler: samplers.len(),
                target: ChannelTarget {
                    node: id.0,
                    path: path.to_string(),
                },
            });
            samplers.push(Sampler {
                input,
                output,
                interpolation: "LINEAR".to_string(),
            });
        }
    }

    Animation {
        name: ANIMATION_NAME.to_string(),
        channels,
        samplers,
    }
}

/// シーングラフを平らにしてドキュメントにする
pub fn build_document(graph: &SceneGraph, frames: &[KeyFrame], config: &ExportConfig) -> Gltf {
    let frame_rate = if config.frame_rate > 0.0 { config.frame_rate } else { 30.0 };
    let mut packer = BufferPacker::new();

    let (meshes, node_meshes) = build_meshes(graph, &mut packer);

    let nodes = graph
        .iter()
        .map(|(id, node)| {
            let posed = node.bone.is_some();
            Node {
                name: node.name.clone(),
                children: node.children.iter().map(|c| c.0).collect(),
                translation: posed.then(|| vec3(&node.translation)),
                rotation: posed.then(|| quat_to_array(&node.rotation)),
                scale: None,
                mesh: node_meshes[id.0],
            }
        })
        .collect();

    let joints: Vec<usize> = graph.joints().map(|(id, _, _)| id.0).collect();
    let inverse_bind_matrices = packer.identity_matrices(joints.len());
    let skin = Skin {
        name: SKIN_NAME.to_string(),
        inverse_bind_matrices,
        joints,
    };

    let animation = build_animation(graph, frames, frame_rate, &mut packer);
    let (buffer, buffer_views, accessors) = packer.finish();

    Gltf {
        asset: Asset {
            version: "2.0".to_string(),
            generator: Some(GENERATOR.to_string()),
            copyright: Some(COPYRIGHT.to_string()),
        },
        scene: 0,
        scenes: vec![Scene { nodes: vec![0] }],
        nodes,
        meshes,
        animations: vec![animation],
        skins: vec![skin],
        accessors,
        buffer_views,
        buffers: vec![buffer],
        materials: Region::materials(),
    }
}

/// 現在のポーズとキーフレーム列を glTF JSON（UTF-8）にする。空なら EmptyStore。
pub fn encode(skeleton: &dyn Skeleton, bones: &BoneMap, frames: &[KeyFrame], config: &ExportConfig) -> Result<Vec<u8>, ExportError> {
    if frames.is_empty() {
        return Err(ExportError::EmptyStore);
    }
    let graph = build_graph(skeleton, bones);
    let document = build_document(&graph, frames, config);
    let json = serde_json::to_vec_pretty(&document)?;

    info!(
        "glTF: {} nodes, {} frames, {} accessors, {} bytes",
        document.nodes.len(),
        frames.len(),
        document.accessors.len(),
        json.len()
    );
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::KeyframeStore;
    use crate::skeleton::{Bone, MemorySkeleton, Side, Space};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::Value;

    fn take(frames: usize) -> (MemorySkeleton, BoneMap, KeyframeStore) {
        let mut skeleton = MemorySkeleton::humanoid();
        let bones = BoneMap::bind(&skeleton).unwrap();
        let mut store = KeyframeStore::new();
        let head = bones.get(Bone::Head).unwrap();
        for i in 0..frames {
            let q = crate::retarget::math::from_euler(0.1 * i as f32, 0.0, 0.0);
            skeleton.set_rotation(head, q, Space::Local);
            store.record(&skeleton, &bones);
        }
        (skeleton, bones, store)
    }

    fn export(frames: usize) -> Value {
        let (skeleton, bones, store) = take(frames);
        let json = encode(&skeleton, &bones, store.frames(), &ExportConfig::default()).unwrap();
        serde_json::from_slice(&json).unwrap()
    }

    #[test]
    fn test_document_shape() {
        let doc = export(3);
        assert_eq!(doc["asset"]["version"], "2.0");
        assert_eq!(doc["asset"]["generator"], GENERATOR);
        assert_eq!(doc["scenes"][0]["nodes"], serde_json::json!([0]));
        assert_eq!(doc["nodes"][0]["name"], SCENE_ROOT);
        assert_eq!(doc["nodes"][0]["children"], serde_json::json!([1]));
        assert!(doc["nodes"][0].get("translation").is_none());
        assert_eq!(doc["nodes"][1]["name"], "全ての親");
        assert_eq!(doc["materials"].as_array().unwrap().len(), 5);

        let joints = doc["nodes"].as_array().unwrap().len() - 1;
        assert_eq!(doc["skins"][0]["joints"].as_array().unwrap().len(), joints);
        assert_eq!(doc["meshes"].as_array().unwrap().len(), joints);
        assert_eq!(doc["animations"][0]["samplers"].as_array().unwrap().len(), joints * 2);
    }

    #[test]
    fn test_accessors_and_buffer_consistent() {
        let doc = export(4);
        let views = doc["bufferViews"].as_array().unwrap();
        let byte_length = doc["buffers"][0]["byteLength"].as_u64().unwrap() as usize;

        for accessor in doc["accessors"].as_array().unwrap() {
            let view = accessor["bufferView"].as_u64().unwrap() as usize;
            assert!(view < views.len(), "bufferView {} out of range", view);
        }
        for view in views {
            let offset = view["byteOffset"].as_u64().unwrap() as usize;
            let length = view["byteLength"].as_u64().unwrap() as usize;
            assert_eq!(offset % 4, 0);
            assert!(offset + length <= byte_length);
        }

        let uri = doc["buffers"][0]["uri"].as_str().unwrap();
        let encoded = uri.strip_prefix("data:application/octet-stream;base64,").unwrap();
        assert_eq!(STANDARD.decode(encoded).unwrap().len(), byte_length);
    }

    #[test]
    fn test_time_accessor_at_frame_rate() {
        let doc = export(31);
        let input = doc["animations"][0]["samplers"][0]["input"].as_u64().unwrap() as usize;
        let times = &doc["accessors"][input];
        assert_eq!(times["count"], 31);
        assert_eq!(times["type"], "SCALAR");
        let max = times["max"][0].as_f64().unwrap();
        assert!((max - 1.0).abs() < 1e-6, "max={}", max);
    }

    #[test]
    fn test_root_is_point_and_children_are_lines() {
        let doc = export(1);
        let meshes = doc["meshes"].as_array().unwrap();
        assert_eq!(meshes[0]["name"], "全ての親_mesh");
        assert_eq!(meshes[0]["primitives"][0]["mode"], MODE_POINTS);
        assert_eq!(meshes[1]["primitives"][0]["mode"], MODE_LINES);
        // 下半身は胴体色
        assert_eq!(meshes[1]["primitives"][0]["material"], Region::Torso.index());
    }

    #[test]
    fn test_missing_bone_holds_previous_value() {
        let (skeleton, bones, store) = take(3);
        let mut frames = store.frames().to_vec();
        frames[1].bones.retain(|b| b.name != "頭");
        let graph = build_graph(&skeleton, &bones);
        let doc = build_document(&graph, &frames, &ExportConfig::default());

        let head = graph.find(Bone::Head).unwrap().0;
        let channel = doc.animations[0]
            .channels
            .iter()
            .find(|c| c.target.node == head && c.target.path == "rotation")
            .unwrap();
        let output = &doc.accessors[doc.animations[0].samplers[channel.sampler].output];
        assert_eq!(output.count, 3);
        assert_eq!(output.kind, "VEC4");

        let node = graph.get(graph.find(Bone::Head).unwrap()).unwrap();
        let (_, rotations) = sample_tracks(&frames, node);
        assert_eq!(rotations[1], rotations[0]);
        assert_ne!(rotations[2], rotations[0]);
    }

    #[test]
    fn test_track_starts_from_rest_pose() {
        let (skeleton, bones, store) = take(3);
        let mut frames = store.frames().to_vec();
        frames[0].bones.retain(|b| b.name != "頭");
        let graph = build_graph(&skeleton, &bones);
        let node = graph.get(graph.find(Bone::Head).unwrap()).unwrap();

        let (positions, rotations) = sample_tracks(&frames, node);
        assert_eq!(positions[0], vec3(&node.translation));
        assert_eq!(rotations[0], quat_to_array(&node.rotation));
        let recorded = frames[1].bone("頭").unwrap();
        assert_eq!(positions[1], recorded.position);
    }

    #[test]
    fn test_legs_spread_apart() {
        let (skeleton, bones, _) = take(1);
        let graph = build_graph(&skeleton, &bones);
        let left = graph.get(graph.find(Bone::Knee(Side::Left)).unwrap()).unwrap();
        let right = graph.get(graph.find(Bone::Knee(Side::Right)).unwrap()).unwrap();
        assert!(left.translation.x < right.translation.x);
    }

    #[test]
    fn test_empty_store_is_error() {
        let skeleton = MemorySkeleton::humanoid();
        let bones = BoneMap::bind(&skeleton).unwrap();
        let result = encode(&skeleton, &bones, &[], &ExportConfig::default());
        assert!(matches!(result, Err(ExportError::EmptyStore)));
    }
}
