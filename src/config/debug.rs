//! 骨骼调试几何配置

use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 骨骼调试几何配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugGeometryConfig {
    /// 关节球体半径
    pub sphere_radius: f32,

    /// 骨骼圆柱半径
    pub cylinder_radius: f32,

    /// 圆柱侧面分段数
    pub cylinder_segments: u32,
}

impl_default!(DebugGeometryConfig {
    sphere_radius: 0.5,
    cylinder_radius: 0.2,
    cylinder_segments: 8,
});

impl DebugGeometryConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.sphere_radius > 0.0) {
            return Err(ConfigError::ValidationError("Invalid sphere radius".to_string()));
        }
        if !(self.cylinder_radius > 0.0) {
            return Err(ConfigError::ValidationError("Invalid cylinder radius".to_string()));
        }
        if self.cylinder_segments < 3 {
            return Err(ConfigError::ValidationError(
                "Cylinder needs at least 3 segments".to_string(),
            ));
        }
        Ok(())
    }
}
