//! Receivers of the rebuilt mesh (the host renderer side).

use log::debug;

use super::Mesh;

/// Render target the bridge hands its mesh to
pub trait MeshTarget {
    /// Called once at init with the (still empty) mesh
    fn attach(&mut self, _mesh: &Mesh) {}

    /// Called every frame after the mesh has been rebuilt
    fn publish(&mut self, mesh: &Mesh);
}

/// Target that only records what it was given
#[derive(Debug, Default, Clone)]
pub struct MeshStats {
    pub attached: bool,
    pub published: u64,
    pub vertex_count: usize,
    pub index_count: usize,
    pub max_height: f32,
}

impl MeshTarget for MeshStats {
    fn attach(&mut self, mesh: &Mesh) {
        self.attached = true;
        debug!("Mesh attached ({} vertices)", mesh.vertex_count());
    }

    fn publish(&mut self, mesh: &Mesh) {
        self.published += 1;
        self.vertex_count = mesh.vertex_count();
        self.index_count = mesh.triangles.len();
        self.max_height = mesh.max_height();
        debug!(
            "Mesh #{}: {} vertices, {} triangles, peak {:.3}",
            self.published,
            self.vertex_count,
            mesh.triangle_count(),
            self.max_height
        );
    }
}
