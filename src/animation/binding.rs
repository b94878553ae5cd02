//! 骨骼与场景节点的绑定
//!
//! 骨架不拥有场景节点，只保存 `骨骼索引 -> 节点句柄` 的查找表。
//! 场景图通过 [`SceneGraph`] trait 提供名称查找、父子关系和变换读写。

use bevy_ecs::prelude::*;
use glam::Mat4;
use serde::{Deserialize, Serialize};

/// 外部场景节点句柄（不拥有节点）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// 场景节点提供者
pub trait SceneGraph {
    /// 节点名称，未命名节点返回 `None` 或空字符串
    fn name(&self, node: NodeId) -> Option<&str>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// `root` 及其全部后代，深度优先先序
    fn descendants(&self, root: NodeId) -> Vec<NodeId>;

    /// 相对父节点的变换
    fn local_matrix(&self, node: NodeId) -> Mat4;

    /// 世界变换
    fn world_matrix(&self, node: NodeId) -> Mat4;

    fn set_local_matrix(&mut self, node: NodeId, matrix: Mat4);

    /// 写入世界变换，默认通过父节点世界矩阵换算为局部变换
    fn set_world_matrix(&mut self, node: NodeId, matrix: Mat4) {
        let local = match self.parent(node) {
            Some(parent) => self.world_matrix(parent).inverse() * matrix,
            None => matrix,
        };
        self.set_local_matrix(node, local);
    }

    /// 在 `root` 子树中按名称查找节点（包括 `root` 自身）
    fn find_descendant(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|&node| self.name(node) == Some(name))
    }
}

// ============================================================================
// 内存场景树
// ============================================================================

#[derive(Clone, Debug)]
struct SceneNode {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Mat4,
}

/// 简单的内存场景树，用于工具、测试和调试几何
#[derive(Resource, Clone, Debug, Default)]
pub struct SceneTree {
    nodes: Vec<SceneNode>,
}

impl SceneTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点，返回其句柄
    pub fn add_node(&mut self, name: impl Into<String>, parent: Option<NodeId>, local: Mat4) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(SceneNode {
            name: name.into(),
            parent,
            children: Vec::new(),
            local,
        });
        if let Some(parent) = parent.and_then(|p| self.node_mut(p)) {
            parent.children.push(id);
        }
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0 as usize)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0 as usize)
    }
}

impl SceneGraph for SceneTree {
    fn name(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(|n| n.name.as_str())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.node(root).is_none() {
            return out;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    fn local_matrix(&self, node: NodeId) -> Mat4 {
        self.node(node).map(|n| n.local).unwrap_or(Mat4::IDENTITY)
    }

    fn world_matrix(&self, node: NodeId) -> Mat4 {
        let mut world = self.local_matrix(node);
        let mut current = self.parent(node);
        while let Some(parent) = current {
            world = self.local_matrix(parent) * world;
            current = self.parent(parent);
        }
        world
    }

    fn set_local_matrix(&mut self, node: NodeId, matrix: Mat4) {
        if let Some(n) = self.node_mut(node) {
            n.local = matrix;
        }
    }
}
