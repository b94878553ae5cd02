//! 渲染/蒙皮输出端
//!
//! 骨架与渲染系统唯一的交互点：把当前姿态的局部矩阵和蒙皮矩阵
//! 按骨骼索引顺序展开为扁平浮点数组（每根骨骼16个浮点数，列主序）推送出去。

use std::sync::{Arc, Mutex};

use super::source::SkeletonSource;

/// 接收骨骼矩阵的渲染/蒙皮端
pub trait SkinningSink: Send + Sync {
    /// 骨骼层级变化（创建、合并）时调用
    fn set_topology(&mut self, _parents: &[i32], _names: &[String]) {}

    /// 当前姿态的局部矩阵
    fn set_bone_pose(&mut self, matrices: &[f32]);

    /// 蒙皮矩阵（当前姿态 x 逆绑定姿态）
    fn set_skin_pose(&mut self, matrices: &[f32]);
}

impl<T: SkinningSink> SkinningSink for Arc<Mutex<T>> {
    fn set_topology(&mut self, parents: &[i32], names: &[String]) {
        match self.lock() {
            Ok(mut inner) => inner.set_topology(parents, names),
            Err(_) => tracing::warn!(target: "skeleton", "Sink lock poisoned, dropped topology update"),
        }
    }

    fn set_bone_pose(&mut self, matrices: &[f32]) {
        match self.lock() {
            Ok(mut inner) => inner.set_bone_pose(matrices),
            Err(_) => tracing::warn!(target: "skeleton", "Sink lock poisoned, dropped bone pose"),
        }
    }

    fn set_skin_pose(&mut self, matrices: &[f32]) {
        match self.lock() {
            Ok(mut inner) => inner.set_skin_pose(matrices),
            Err(_) => tracing::warn!(target: "skeleton", "Sink lock poisoned, dropped skin pose"),
        }
    }
}

/// 底层骨骼缓冲区
///
/// 保存推送过来的层级和矩阵，同时可作为 [`SkeletonSource`] 重新构建骨架。
#[derive(Clone, Debug, Default)]
pub struct SkeletonBuffer {
    pub parents: Vec<i32>,
    pub names: Vec<String>,
    /// 当前姿态局部矩阵
    pub bone_pose: Vec<f32>,
    /// 蒙皮矩阵
    pub skin_pose: Vec<f32>,
    /// 蒙皮矩阵上传次数
    pub skin_updates: u64,
}

impl SkeletonBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以单位姿态创建给定层级的缓冲区
    pub fn with_topology(parents: Vec<i32>, names: Vec<String>) -> Self {
        let bone_pose = glam::Mat4::IDENTITY
            .to_cols_array()
            .repeat(parents.len());
        Self {
            parents,
            names,
            bone_pose,
            ..Self::default()
        }
    }

    /// 第 `bone` 根骨骼的蒙皮矩阵
    pub fn skin_matrix(&self, bone: usize) -> Option<glam::Mat4> {
        self.skin_pose
            .get(bone * 16..bone * 16 + 16)
            .map(glam::Mat4::from_cols_slice)
    }

    pub fn bone_matrix(&self, bone: usize) -> Option<glam::Mat4> {
        self.bone_pose
            .get(bone * 16..bone * 16 + 16)
            .map(glam::Mat4::from_cols_slice)
    }
}

impl SkinningSink for SkeletonBuffer {
    fn set_topology(&mut self, parents: &[i32], names: &[String]) {
        self.parents = parents.to_vec();
        self.names = names.to_vec();
    }

    fn set_bone_pose(&mut self, matrices: &[f32]) {
        self.bone_pose.clear();
        self.bone_pose.extend_from_slice(matrices);
    }

    fn set_skin_pose(&mut self, matrices: &[f32]) {
        self.skin_pose.clear();
        self.skin_pose.extend_from_slice(matrices);
        self.skin_updates += 1;
    }
}

impl SkeletonSource for SkeletonBuffer {
    fn bone_count(&self) -> usize {
        self.parents.len()
    }

    fn bone_parents(&self) -> Vec<i32> {
        self.parents.clone()
    }

    fn bone_name(&self, bone: usize) -> Option<String> {
        self.names.get(bone).cloned()
    }

    fn pose_matrices(&self) -> Vec<f32> {
        self.bone_pose.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    #[test]
    fn test_buffer_records_pushes() {
        let mut buffer = SkeletonBuffer::new();
        buffer.set_topology(&[-1, 0], &["a".to_string(), "b".to_string()]);
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut flat = Mat4::IDENTITY.to_cols_array().to_vec();
        flat.extend_from_slice(&m.to_cols_array());
        buffer.set_skin_pose(&flat);

        assert_eq!(buffer.skin_updates, 1);
        assert_eq!(buffer.skin_matrix(1), Some(m));
        assert_eq!(buffer.skin_matrix(2), None);
        assert_eq!(SkeletonSource::bone_count(&buffer), 2);
    }

    #[test]
    fn test_shared_sink() {
        let shared = Arc::new(Mutex::new(SkeletonBuffer::new()));
        let mut sink: Box<dyn SkinningSink> = Box::new(shared.clone());
        sink.set_bone_pose(&Mat4::IDENTITY.to_cols_array());
        assert_eq!(shared.lock().unwrap().bone_pose.len(), 16);
    }

    #[test]
    fn test_poisoned_sink_drops_pushes() {
        let shared = Arc::new(Mutex::new(SkeletonBuffer::new()));
        let poisoner = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the sink");
        })
        .join();
        assert!(shared.is_poisoned());

        let mut sink: Box<dyn SkinningSink> = Box::new(shared.clone());
        sink.set_topology(&[-1], &["a".to_string()]);
        sink.set_bone_pose(&Mat4::IDENTITY.to_cols_array());
        sink.set_skin_pose(&Mat4::IDENTITY.to_cols_array());

        let buffer = shared.lock().unwrap_or_else(|e| e.into_inner());
        assert!(buffer.parents.is_empty());
        assert!(buffer.bone_pose.is_empty());
        assert_eq!(buffer.skin_updates, 0);
    }

    #[test]
    fn test_with_topology_is_identity() {
        let buffer = SkeletonBuffer::with_topology(vec![-1, 0, 0], vec![]);
        assert_eq!(buffer.bone_pose.len(), 48);
        assert_eq!(buffer.bone_matrix(2), Some(Mat4::IDENTITY));
    }
}
