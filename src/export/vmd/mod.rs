//! VMD（MMD モーション）形式の書き出しと読み込み

pub mod record;
pub mod reduce;

use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::info;

use crate::config::ExportConfig;
use crate::export::ExportError;
use crate::keyframe::KeyFrame;

pub use record::{BoneRecord, DecodeError, MorphRecord};
pub use reduce::{FrameData, Reduction};

/// 読み込んだ VMD の中身
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VmdMotion {
    pub model_name: String,
    pub bones: Vec<BoneRecord>,
    pub morphs: Vec<MorphRecord>,
}

impl VmdMotion {
    /// 最大フレーム番号 + 1
    pub fn frame_count(&self) -> usize {
        let bone_max = self.bones.iter().map(|b| b.frame);
        let morph_max = self.morphs.iter().map(|m| m.frame);
        bone_max.chain(morph_max).max().map_or(0, |f| f as usize + 1)
    }

    pub fn joint_names(&self) -> BTreeSet<&str> {
        self.bones.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn morph_names(&self) -> BTreeSet<&str> {
        self.morphs.iter().map(|m| m.name.as_str()).collect()
    }

    pub fn duration(&self, frame_rate: f32) -> f32 {
        match self.frame_count() {
            0 => 0.0,
            n if frame_rate > 0.0 => (n - 1) as f32 / frame_rate,
            _ => 0.0,
        }
    }
}

/// キーフレーム列を VMD バイト列にする。空なら EmptyStore。
pub fn encode(frames: &[KeyFrame], config: &ExportConfig) -> Result<Vec<u8>, ExportError> {
    if frames.is_empty() {
        return Err(ExportError::EmptyStore);
    }

    let data: Vec<FrameData> = frames.iter().map(FrameData::from_keyframe).collect();
    let kept = reduce::reduce(&data, &Reduction::from_config(config));

    let bone_count: usize = kept.iter().map(|&i| data[i].bones.len()).sum();
    let morph_count: usize = kept.iter().map(|&i| data[i].morphs.len()).sum();

    let mut buf = Vec::with_capacity(
        record::HEADER_LEN
            + record::MODEL_NAME_LEN
            + 4
            + bone_count * record::BONE_RECORD_LEN
            + 4
            + morph_count * record::MORPH_RECORD_LEN
            + 12,
    );
    record::write_header(&mut buf, &config.model_name)?;

    // フレーム番号は間引き後の並び順
    buf.write_u32::<LittleEndian>(bone_count as u32)?;
    for (frame, &i) in kept.iter().enumerate() {
        for bone in &data[i].bones {
            BoneRecord {
                frame: frame as u32,
                ..bone.clone()
            }
            .write(&mut buf)?;
        }
    }

    buf.write_u32::<LittleEndian>(morph_count as u32)?;
    for (frame, &i) in kept.iter().enumerate() {
        for morph in &data[i].morphs {
            MorphRecord {
                frame: frame as u32,
                ..morph.clone()
            }
            .write(&mut buf)?;
        }
    }

    // カメラ・照明・セルフ影
    for _ in 0..3 {
        buf.write_u32::<LittleEndian>(0)?;
    }
    buf.flush()?;

    info!(
        "VMD: {} -> {} frames, {} bone records, {} morph records, {} bytes",
        frames.len(),
        kept.len(),
        bone_count,
        morph_count,
        buf.len()
    );
    Ok(buf)
}

pub fn decode(bytes: &[u8]) -> Result<VmdMotion, DecodeError> {
    let mut r = Cursor::new(bytes);
    let model_name = record::read_header(&mut r)?;

    let bone_count = r.read_u32::<LittleEndian>()? as usize;
    // 件数が残りサイズを超えていれば途中で切れている
    let remaining = bytes.len().saturating_sub(r.position() as usize);
    if bone_count.saturating_mul(record::BONE_RECORD_LEN) > remaining {
        return Err(DecodeError::Truncated(std::io::ErrorKind::UnexpectedEof.into()));
    }
    let mut bones = Vec::with_capacity(bone_count);
    for _ in 0..bone_count {
        bones.push(BoneRecord::read(&mut r)?);
    }

    let morph_count = r.read_u32::<LittleEndian>()? as usize;
    let remaining = bytes.len().saturating_sub(r.position() as usize);
    if morph_count.saturating_mul(record::MORPH_RECORD_LEN) > remaining {
        return Err(DecodeError::Truncated(std::io::ErrorKind::UnexpectedEof.into()));
    }
    let mut morphs = Vec::with_capacity(morph_count);
    for _ in 0..morph_count {
        morphs.push(MorphRecord::read(&mut r)?);
    }

    Ok(VmdMotion {
        model_name,
        bones,
        morphs,
    })
}
