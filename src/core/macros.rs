//! 核心宏定义
//!
//! 配置类型共用的默认值宏

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```ignore
/// struct DebugGeometry {
///     sphere_radius: f32,
///     label: String,
/// }
///
/// impl_default!(DebugGeometry {
///     sphere_radius: 0.5,
///     label: String::new(),
/// });
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

/// 同时实现Default和new()的宏
#[macro_export]
macro_rules! impl_default_and_new {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }

        impl $struct_name {
            pub fn new() -> Self {
                Self::default()
            }
        }
    };
}
