//! 统一配置系统
//!
//! 提供TOML/JSON配置文件、环境变量和运行时调整

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::animation::BoneOptions;
use crate::impl_default;
use glam::Vec3;

pub mod debug;
pub mod logging;

pub use debug::DebugGeometryConfig;
pub use logging::{init_logging, LogLevel, LoggingConfig};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 骨骼主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonConfig {
    /// 骨骼Z轴，定义骨骼坐标系
    pub bone_axis: [f32; 3],

    /// 动画时根骨骼的偏移
    pub root_offset: [f32; 3],

    /// 合并骨骼时新骨骼的选项
    pub merged_bone_options: BoneOptions,

    /// 调试几何配置
    #[serde(default)]
    pub debug: DebugGeometryConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl_default!(SkeletonConfig {
    bone_axis: [0.0, 0.0, 1.0],
    root_offset: [0.0, 0.0, 0.0],
    merged_bone_options: BoneOptions::ANIMATE,
    debug: DebugGeometryConfig::default(),
    logging: LoggingConfig::default(),
});

impl SkeletonConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bone_axis(&self) -> Vec3 {
        Vec3::from_array(self.bone_axis)
    }

    pub fn root_offset(&self) -> Vec3 {
        Vec3::from_array(self.root_offset)
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    ///
    /// 向量使用逗号分隔，例如 `ENGINE_SKELETON_BONE_AXIS=0,1,0`
    pub fn apply_env_overrides(&mut self) {
        if let Some(axis) = env_vec3("ENGINE_SKELETON_BONE_AXIS") {
            self.bone_axis = axis;
        }
        if let Some(offset) = env_vec3("ENGINE_SKELETON_ROOT_OFFSET") {
            self.root_offset = offset;
        }
        if let Ok(val) = env::var("ENGINE_SKELETON_DEBUG_SPHERE_RADIUS") {
            if let Ok(radius) = val.parse() {
                self.debug.sphere_radius = radius;
            }
        }
        if let Ok(val) = env::var("ENGINE_SKELETON_LOG_LEVEL") {
            if let Some(level) = LogLevel::parse(&val) {
                self.logging.level = level;
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bone_axis.iter().any(|c| !c.is_finite()) || self.bone_axis() == Vec3::ZERO {
            return Err(ConfigError::ValidationError(
                "Bone axis must be a finite non-zero vector".to_string(),
            ));
        }
        if self.root_offset.iter().any(|c| !c.is_finite()) {
            return Err(ConfigError::ValidationError(
                "Root offset must be finite".to_string(),
            ));
        }
        self.debug.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./skeleton.toml
    /// 2. ./skeleton.json
    /// 3. ~/.config/xr_skeleton/skeleton.toml
    /// 4. 使用默认配置
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::from_toml_file("skeleton.toml") {
            tracing::info!(target: "config", "Loaded skeleton config from skeleton.toml");
            return config;
        }

        if let Ok(config) = Self::from_json_file("skeleton.json") {
            tracing::info!(target: "config", "Loaded skeleton config from skeleton.json");
            return config;
        }

        if let Some(home) = env::var_os("HOME") {
            let config_path = PathBuf::from(home)
                .join(".config")
                .join("xr_skeleton")
                .join("skeleton.toml");

            if let Ok(config) = Self::from_toml_file(&config_path) {
                tracing::info!(target: "config", "Loaded skeleton config from {:?}", config_path);
                return config;
            }
        }

        tracing::info!(target: "config", "Using default skeleton configuration");
        Self::default()
    }
}

fn env_vec3(key: &str) -> Option<[f32; 3]> {
    let val = env::var(key).ok()?;
    let parts: Vec<f32> = val
        .split(',')
        .map(|s| s.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, z] => Some([*x, *y, *z]),
        _ => None,
    }
}
