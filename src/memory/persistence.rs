//! 会话持久化
//!
//! 存档格式为 JSON 四元组 `[魔术标记, canonical 历史, display 历史, 响应记录]`。
//! 导入时先校验标记；标记不符、文件缺失或解析失败都不是硬错误，调用方保留当前状态。

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::memory::{Message, ResponseRecord};

/// 存档魔术标记（格式变更时递增版本号）
pub const SAVEFILE_MAGIC: &str = "Parley~Savefile~v1";

/// 会话存档：序列化为有序的四元素数组
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFile(String, Vec<Message>, Vec<Message>, Vec<ResponseRecord>);

impl SaveFile {
    pub fn new(canonical: Vec<Message>, display: Vec<Message>, responses: Vec<ResponseRecord>) -> Self {
        Self(SAVEFILE_MAGIC.to_string(), canonical, display, responses)
    }

    pub fn tag(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 == SAVEFILE_MAGIC
    }

    pub fn into_parts(self) -> (Vec<Message>, Vec<Message>, Vec<ResponseRecord>) {
        (self.1, self.2, self.3)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// 解析存档；结构不符或标记不符时返回 None
    pub fn from_json(data: &str) -> Option<Self> {
        let save: SaveFile = serde_json::from_str(data).ok()?;
        save.is_valid().then_some(save)
    }

    /// 写入文件；父目录不存在时自动创建
    pub fn write_to(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// 从文件读取；文件不存在或内容无效时返回 None
    pub fn read_from(path: impl AsRef<Path>) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        Self::from_json(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_as_four_element_array() {
        let save = SaveFile::new(vec![Message::system("S")], vec![Message::system("S")], vec![]);
        let value: serde_json::Value = serde_json::from_str(&save.to_json().unwrap()).unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr[0], SAVEFILE_MAGIC);
    }

    #[test]
    fn test_tag_mismatch_is_rejected() {
        let data = r#"["SomethingElse", [], [], []]"#;
        assert!(SaveFile::from_json(data).is_none());
        assert!(SaveFile::from_json("not json").is_none());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/session.json");
        let save = SaveFile::new(
            vec![Message::system("S"), Message::user("expanded")],
            vec![Message::system("S"), Message::user("raw")],
            vec![ResponseRecord::new(None, "ok")],
        );
        save.write_to(&path).unwrap();
        assert_eq!(SaveFile::read_from(&path), Some(save));
        assert!(SaveFile::read_from(dir.path().join("missing.json")).is_none());
    }
}
