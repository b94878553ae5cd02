//! 底层骨骼表示与骨骼描述文件
//!
//! [`SkeletonSource`] 提供骨骼数量、父子关系、名称和姿态矩阵，
//! 用于从已有的底层骨骼（原生缓冲区、资源文件）构建 [`Skeleton`](super::Skeleton)。

use std::fs;
use std::path::Path;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::error::{SkeletonError, SkeletonResult};

/// 已构建的底层骨骼表示
pub trait SkeletonSource {
    fn bone_count(&self) -> usize;

    /// 每根骨骼的父索引，-1 表示根骨骼
    fn bone_parents(&self) -> Vec<i32>;

    fn bone_name(&self, bone: usize) -> Option<String>;

    /// 每根骨骼相对父骨骼的矩阵，扁平数组（16个浮点数/骨骼，列主序）
    fn pose_matrices(&self) -> Vec<f32>;
}

// ============================================================================
// 骨骼描述文件
// ============================================================================

/// 序列化的骨骼数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneDesc {
    /// 骨骼名称
    pub name: String,
    /// 父骨骼名称，根骨骼省略
    #[serde(default)]
    pub parent: Option<String>,
    /// 局部旋转 (x, y, z, w)
    #[serde(default = "identity_rotation")]
    pub rotation: [f32; 4],
    /// 局部平移
    #[serde(default)]
    pub position: [f32; 3],
}

fn identity_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

/// 序列化的骨架描述，骨骼按父在前、子在后的顺序排列
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkeletonDesc {
    pub bones: Vec<BoneDesc>,
}

impl SkeletonDesc {
    /// 从JSON字符串解析
    pub fn from_json_str(content: &str) -> SkeletonResult<Self> {
        serde_json::from_str(content).map_err(|e| SkeletonError::Parse(e.to_string()))
    }

    /// 从TOML字符串解析
    pub fn from_toml_str(content: &str) -> SkeletonResult<Self> {
        toml::from_str(content).map_err(|e| SkeletonError::Parse(e.to_string()))
    }

    /// 按扩展名（`.json` / `.toml`）加载描述文件
    pub fn load<P: AsRef<Path>>(path: P) -> SkeletonResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SkeletonError::Parse(format!("{}: {e}", path.display())))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        }
    }

    pub fn to_json_string(&self) -> SkeletonResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SkeletonError::Parse(e.to_string()))
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }
}

impl SkeletonSource for SkeletonDesc {
    fn bone_count(&self) -> usize {
        self.bones.len()
    }

    fn bone_parents(&self) -> Vec<i32> {
        self.bones
            .iter()
            .map(|b| {
                b.parent
                    .as_deref()
                    .and_then(|p| self.index_of(p))
                    .map_or(-1, |i| i as i32)
            })
            .collect()
    }

    fn bone_name(&self, bone: usize) -> Option<String> {
        self.bones.get(bone).map(|b| b.name.clone())
    }

    fn pose_matrices(&self) -> Vec<f32> {
        self.bones
            .iter()
            .flat_map(|b| {
                let [x, y, z, w] = b.rotation;
                let rotation = Quat::from_xyzw(x, y, z, w).normalize();
                Mat4::from_rotation_translation(rotation, Vec3::from_array(b.position))
                    .to_cols_array()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARM_JSON: &str = r#"{
        "bones": [
            { "name": "shoulder" },
            { "name": "elbow", "parent": "shoulder", "position": [0.0, 1.0, 0.0] },
            { "name": "wrist", "parent": "elbow", "position": [0.0, 1.0, 0.0] }
        ]
    }"#;

    #[test]
    fn test_parse_json() {
        let desc = SkeletonDesc::from_json_str(ARM_JSON).unwrap();
        assert_eq!(desc.bone_count(), 3);
        assert_eq!(desc.bone_parents(), vec![-1, 0, 1]);
        assert_eq!(desc.bone_name(2).as_deref(), Some("wrist"));

        let matrices = desc.pose_matrices();
        assert_eq!(matrices.len(), 48);
        assert_eq!(matrices[16 + 13], 1.0);
    }

    #[test]
    fn test_parse_toml() {
        let desc = SkeletonDesc::from_toml_str(
            r#"
            [[bones]]
            name = "root"

            [[bones]]
            name = "child"
            parent = "root"
            position = [1.0, 0.0, 0.0]
            "#,
        )
        .unwrap();
        assert_eq!(desc.bone_parents(), vec![-1, 0]);
    }

    #[test]
    fn test_unknown_parent_is_root() {
        let desc = SkeletonDesc::from_json_str(
            r#"{ "bones": [ { "name": "a" }, { "name": "b", "parent": "missing" } ] }"#,
        )
        .unwrap();
        assert_eq!(desc.bone_parents(), vec![-1, -1]);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            SkeletonDesc::from_json_str("{ not json"),
            Err(SkeletonError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arm.json");
        std::fs::write(&path, ARM_JSON).unwrap();
        let desc = SkeletonDesc::load(&path).unwrap();
        assert_eq!(desc.bones.len(), 3);
    }
}
