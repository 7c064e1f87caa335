//! CapCAD原生文件格式（.ccad）
//!
//! 文件头之后是 Zstd 压缩的 MessagePack 快照。快照内容与 JSON 快照完全一致，
//! 只是编码更紧凑，加载时同样执行结构版本检查。

use crate::error::FileError;
use crate::snapshot::{self, SchemaHeader, Snapshot};
use capcad_core::scene::Scene;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// 文件魔数 "CCAD"
const MAGIC: &[u8; 4] = b"CCAD";

/// 当前文件格式版本
const FORMAT_VERSION: u32 = 1;

/// 文件头长度
const HEADER_LEN: usize = 16;

/// Zstd 压缩级别
const COMPRESSION_LEVEL: i32 = 3;

/// 文件头：魔数之后依次是格式版本、标志位（预留）与压缩数据长度，均为小端 u32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
    format_version: u32,
    flags: u32,
    payload_len: u32,
}

impl FileHeader {
    fn for_payload(payload_len: u32) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            flags: 0,
            payload_len,
        }
    }

    fn to_bytes(self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[..4].copy_from_slice(MAGIC);
        bytes[4..8].copy_from_slice(&self.format_version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.flags.to_le_bytes());
        bytes[12..].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    /// 校验魔数与格式版本
    fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self, FileError> {
        if &bytes[..4] != MAGIC {
            return Err(FileError::InvalidFormat(
                "Invalid magic number, not a CapCAD file".to_string(),
            ));
        }

        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let header = Self {
            format_version: word(4),
            flags: word(8),
            payload_len: word(12),
        };

        if header.format_version > FORMAT_VERSION {
            return Err(FileError::UnsupportedVersion(format!(
                "File version {} is newer than supported version {}",
                header.format_version, FORMAT_VERSION
            )));
        }
        Ok(header)
    }

    fn read(reader: &mut impl Read) -> Result<Self, FileError> {
        let mut bytes = [0u8; HEADER_LEN];
        reader.read_exact(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}

/// 保存场景到文件
pub fn save(scene: &Scene, path: &Path) -> Result<(), FileError> {
    let content = snapshot::serialize(scene);

    // 字段名编码，保持与 JSON 快照相同的结构
    let msgpack_data = rmp_serde::to_vec_named(&content)?;
    let compressed_data = zstd::encode_all(msgpack_data.as_slice(), COMPRESSION_LEVEL)?;

    let payload_len = u32::try_from(compressed_data.len()).map_err(|_| {
        FileError::InvalidFormat(format!(
            "Compressed payload too large: {} bytes",
            compressed_data.len()
        ))
    })?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&FileHeader::for_payload(payload_len).to_bytes())?;
    writer.write_all(&compressed_data)?;
    writer.flush()?;

    tracing::info!(
        "Saved {} entities, {} layers to {} ({} bytes compressed)",
        content.entities.len(),
        content.layers.len(),
        path.display(),
        compressed_data.len()
    );

    Ok(())
}

/// 从文件加载场景
///
/// 先只解码 `schemaVersion`，版本不匹配时不再解析实体与图层。
pub fn load(path: &Path) -> Result<Scene, FileError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let header = FileHeader::read(&mut reader)?;

    let mut compressed_data = vec![0u8; header.payload_len as usize];
    reader.read_exact(&mut compressed_data)?;
    let msgpack_data = zstd::decode_all(compressed_data.as_slice())?;

    rmp_serde::from_slice::<SchemaHeader>(&msgpack_data)?.check()?;
    let content: Snapshot = rmp_serde::from_slice(&msgpack_data)?;
    let scene = snapshot::deserialize(content)?;

    tracing::info!(
        "Loaded {} entities, {} layers from {}",
        scene.len(),
        scene.layers().len(),
        path.display()
    );

    Ok(scene)
}

/// 以 JSON 快照形式保存
pub fn save_json(scene: &Scene, path: &Path) -> Result<(), FileError> {
    let text = snapshot::to_json(scene)?;
    std::fs::write(path, text)?;
    tracing::info!("Saved {} entities to {}", scene.len(), path.display());
    Ok(())
}

/// 加载 JSON 快照文件
pub fn load_json(path: &Path) -> Result<Scene, FileError> {
    let text = std::fs::read_to_string(path)?;
    snapshot::from_json(&text)
}
