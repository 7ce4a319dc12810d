use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use encoding_rs::SHIFT_JIS;
use thiserror::Error;

use crate::export::ExportError;

pub const MAGIC: &[u8] = b"Vocaloid Motion Data 0002";
pub const HEADER_LEN: usize = 30;
pub const MODEL_NAME_LEN: usize = 20;
pub const NAME_LEN: usize = 15;
/// 補間パラメータ（固定値 20 で埋める）
pub const INTERPOLATION_LEN: usize = 64;
pub const INTERPOLATION_FILL: u8 = 20;
/// 名前 15 + フレーム 4 + 位置 12 + 回転 16 + 補間 64
pub const BONE_RECORD_LEN: usize = NAME_LEN + 4 + 12 + 16 + INTERPOLATION_LEN;
pub const MORPH_RECORD_LEN: usize = NAME_LEN + 4 + 4;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a VMD file")]
    BadMagic,
    #[error("truncated record: {0}")]
    Truncated(#[from] std::io::Error),
}

/// Shift_JIS で固定長に詰める（長ければバイト単位で切る）
pub fn write_name<W: Write>(w: &mut W, name: &str, len: usize) -> Result<(), ExportError> {
    let (bytes, _, had_errors) = SHIFT_JIS.encode(name);
    if had_errors {
        return Err(ExportError::NameEncoding(name.to_string()));
    }
    let mut field = vec![0u8; len];
    let n = bytes.len().min(len);
    field[..n].copy_from_slice(&bytes[..n]);
    w.write_all(&field)?;
    Ok(())
}

pub fn read_name<R: Read>(r: &mut R, len: usize) -> Result<String, DecodeError> {
    let mut field = vec![0u8; len];
    r.read_exact(&mut field)?;
    let end = field.iter().position(|&b| b == 0).unwrap_or(len);
    let (name, _) = SHIFT_JIS.decode_without_bom_handling(&field[..end]);
    Ok(name.into_owned())
}

pub fn write_header<W: Write>(w: &mut W, model_name: &str) -> Result<(), ExportError> {
    let mut header = [0u8; HEADER_LEN];
    header[..MAGIC.len()].copy_from_slice(MAGIC);
    w.write_all(&header)?;
    write_name(w, model_name, MODEL_NAME_LEN)
}

/// ヘッダを読んでモデル名を返す
pub fn read_header<R: Read>(r: &mut R) -> Result<String, DecodeError> {
    let mut header = [0u8; HEADER_LEN];
    r.read_exact(&mut header)?;
    if !header.starts_with(MAGIC) {
        return Err(DecodeError::BadMagic);
    }
    read_name(r, MODEL_NAME_LEN)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneRecord {
    pub name: String,
    pub frame: u32,
    pub position: [f32; 3],
    /// x, y, z, w
    pub rotation: [f32; 4],
}

impl BoneRecord {
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), ExportError> {
        write_name(w, &self.name, NAME_LEN)?;
        w.write_u32::<LittleEndian>(self.frame)?;
        for v in self.position.iter().chain(self.rotation.iter()) {
            w.write_f32::<LittleEndian>(*v)?;
        }
        w.write_all(&[INTERPOLATION_FILL; INTERPOLATION_LEN])?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let name = read_name(r, NAME_LEN)?;
        let frame = r.read_u32::<LittleEndian>()?;
        let mut position = [0.0; 3];
        for v in position.iter_mut() {
            *v = r.read_f32::<LittleEndian>()?;
        }
        let mut rotation = [0.0; 4];
        for v in rotation.iter_mut() {
            *v = r.read_f32::<LittleEndian>()?;
        }
        let mut interpolation = [0u8; INTERPOLATION_LEN];
        r.read_exact(&mut interpolation)?;
        Ok(Self {
            name,
            frame,
            position,
            rotation,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphRecord {
    pub name: String,
    pub frame: u32,
    pub weight: f32,
}

impl MorphRecord {
    pub fn write<W: Write>(&self, w: &mut W) -> Result<(), ExportError> {
        write_name(w, &self.name, NAME_LEN)?;
        w.write_u32::<LittleEndian>(self.frame)?;
        w.write_f32::<LittleEndian>(self.weight)?;
        Ok(())
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let name = read_name(r, NAME_LEN)?;
        let frame = r.read_u32::<LittleEndian>()?;
        let weight = r.read_f32::<LittleEndian>()?;
        Ok(Self { name, frame, weight })
    }
}
