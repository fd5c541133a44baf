use crate::constants::QUAD_SIZE;
use glam::Mat4;

/// Handle to a disposable GPU object owned by a `Renderer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// Fixed orthographic camera; the default frames the clip-space quad exactly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrthoCamera {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for OrthoCamera {
    fn default() -> Self {
        Self {
            left: -1.0,
            right: 1.0,
            top: 1.0,
            bottom: -1.0,
            near: 0.0,
            far: 1.0,
        }
    }
}

impl OrthoCamera {
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::orthographic_rh(
            self.left,
            self.right,
            self.bottom,
            self.top,
            self.near,
            self.far,
        )
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Axis-aligned plane in the XY plane centered on the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadGeometry {
    pub width: f32,
    pub height: f32,
}

impl Default for QuadGeometry {
    fn default() -> Self {
        Self {
            width: QUAD_SIZE,
            height: QUAD_SIZE,
        }
    }
}

impl QuadGeometry {
    pub const INDICES: [u16; 6] = [0, 2, 1, 2, 3, 1];

    pub fn vertices(&self) -> [QuadVertex; 4] {
        let (hw, hh) = (self.width * 0.5, self.height * 0.5);
        [
            QuadVertex {
                position: [-hw, hh, 0.0],
                uv: [0.0, 1.0],
            },
            QuadVertex {
                position: [hw, hh, 0.0],
                uv: [1.0, 1.0],
            },
            QuadVertex {
                position: [-hw, -hh, 0.0],
                uv: [0.0, 0.0],
            },
            QuadVertex {
                position: [hw, -hh, 0.0],
                uv: [1.0, 0.0],
            },
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mesh {
    pub geometry: ResourceId,
    pub program: ResourceId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Mesh(Mesh),
    Group(Vec<Node>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
}

/// Scene graph: an ordered tree of meshes and groups.
///
/// Nodes own their children outright, so there are no back-references and
/// the tree walk in `clear` cannot revisit a node.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    children: Vec<Node>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id)
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> NodeId {
        let id = self.alloc();
        self.children.push(Node {
            id,
            kind: NodeKind::Mesh(mesh),
        });
        id
    }

    pub fn add_group(&mut self) -> NodeId {
        let id = self.alloc();
        self.children.push(Node {
            id,
            kind: NodeKind::Group(Vec::new()),
        });
        id
    }

    /// Add a mesh under an existing group. Returns None if `parent` is not a group.
    pub fn add_mesh_to(&mut self, parent: NodeId, mesh: Mesh) -> Option<NodeId> {
        let id = self.alloc();
        let group = find_group(&mut self.children, parent)?;
        group.push(Node {
            id,
            kind: NodeKind::Mesh(mesh),
        });
        Some(id)
    }

    /// Add an empty group under an existing group.
    pub fn add_group_to(&mut self, parent: NodeId) -> Option<NodeId> {
        let id = self.alloc();
        let group = find_group(&mut self.children, parent)?;
        group.push(Node {
            id,
            kind: NodeKind::Group(Vec::new()),
        });
        Some(id)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Visit every mesh in draw order (depth-first, children in insertion order).
    pub fn for_each_mesh(&self, mut f: impl FnMut(&Mesh)) {
        fn walk(nodes: &[Node], f: &mut dyn FnMut(&Mesh)) {
            for node in nodes {
                match &node.kind {
                    NodeKind::Mesh(m) => f(m),
                    NodeKind::Group(children) => walk(children, f),
                }
            }
        }
        walk(&self.children, &mut f);
    }

    /// Remove every node. A group's children are cleared before the group
    /// itself is removed; `on_remove` sees ids in removal order. Returns the
    /// number of nodes removed.
    pub fn clear(&mut self, on_remove: &mut dyn FnMut(NodeId)) -> usize {
        clear_nodes(&mut self.children, on_remove)
    }
}

fn clear_nodes(nodes: &mut Vec<Node>, on_remove: &mut dyn FnMut(NodeId)) -> usize {
    let mut removed = 0;
    for mut node in nodes.drain(..) {
        if let NodeKind::Group(children) = &mut node.kind {
            removed += clear_nodes(children, on_remove);
        }
        on_remove(node.id);
        removed += 1;
    }
    removed
}

fn find_group(nodes: &mut [Node], id: NodeId) -> Option<&mut Vec<Node>> {
    for node in nodes.iter_mut() {
        if let NodeKind::Group(children) = &mut node.kind {
            if node.id == id {
                return Some(children);
            }
            if let Some(found) = find_group(children, id) {
                return Some(found);
            }
        }
    }
    None
}

/// GPU objects created during setup, released exactly once on teardown.
#[derive(Clone, Debug, Default)]
pub struct ResourceList {
    items: Vec<ResourceId>,
}

impl ResourceList {
    pub fn track(&mut self, id: ResourceId) {
        self.items.push(id);
    }

    /// Hand back every tracked resource and forget them. A second call
    /// returns nothing.
    pub fn drain(&mut self) -> Vec<ResourceId> {
        std::mem::take(&mut self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
