//! Wavefront OBJ export of a rebuilt mesh.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::Mesh;
use crate::error::{Result, VisualizerError};

/// Write positions, normals and faces (1-based, `v//vn`)
pub fn write_obj<W: Write>(mesh: &Mesh, mut out: W) -> Result<()> {
    if mesh.triangles.len() % 3 != 0 {
        return Err(VisualizerError::Export(format!(
            "triangle list length {} is not a multiple of 3",
            mesh.triangles.len()
        )));
    }

    writeln!(out, "# cubewave mesh: {} vertices", mesh.vertex_count())?;
    for p in &mesh.positions {
        writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
    }
    for n in &mesh.normals {
        writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
    }
    for tri in mesh.triangles.chunks(3) {
        let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
        writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }
    out.flush()?;
    Ok(())
}

pub fn save_obj(mesh: &Mesh, path: impl AsRef<Path>) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_obj(mesh, BufWriter::new(file))
}
