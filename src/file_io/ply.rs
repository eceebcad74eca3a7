// Loads triangle meshes from PLY files. Any vertex layout ply-rs understands works as long as
// it has x, y and z. Normals are read when all of nx, ny and nz exist, otherwise they get
// generated. Faces must be triangles.

use crate::mesh::{Mesh, Triangle};
use log::info;
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};
use pmath::vector::Vec3;
use simple_error::{bail, try_with, SimpleResult};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub fn load_path(path: &Path) -> SimpleResult<Mesh> {
    let mut file = try_with!(File::open(path), "problem when opening ply file: {}", path.display());
    let mesh = try_with!(
        load_reader(&mut file),
        "problem when loading ply file: {}",
        path.display()
    );
    info!(
        "Loaded {} ({} vertices, {} triangles)",
        path.display(),
        mesh.num_vert(),
        mesh.num_tri()
    );
    Ok(mesh)
}

pub fn load_reader<T: Read>(source: &mut T) -> SimpleResult<Mesh> {
    let parser = Parser::<DefaultElement>::new();
    let ply = try_with!(parser.read_ply(source), "could not parse ply data");

    let vertices = match ply.payload.get("vertex") {
        Some(vertices) if !vertices.is_empty() => vertices,
        _ => bail!("No vertices in the ply data"),
    };
    let faces = match ply.payload.get("face") {
        Some(faces) if !faces.is_empty() => faces,
        _ => bail!("No face information in the ply data"),
    };

    let mut poss = Vec::with_capacity(vertices.len());
    for vertex in vertices {
        poss.push(read_vec3(vertex, ["x", "y", "z"])?);
    }

    let has_nrm = ["nx", "ny", "nz"]
        .iter()
        .all(|name| vertices[0].contains_key(*name));
    let nrms = if has_nrm {
        let mut nrms = Vec::with_capacity(vertices.len());
        for vertex in vertices {
            nrms.push(read_vec3(vertex, ["nx", "ny", "nz"])?);
        }
        Some(nrms)
    } else {
        None
    };

    let mut tris = Vec::with_capacity(faces.len());
    for face in faces {
        let indices = match face
            .get("vertex_indices")
            .or_else(|| face.get("vertex_index"))
        {
            Some(list) => list_to_indices(list)?,
            None => bail!("Face without a vertex_indices list"),
        };
        if indices.len() != 3 {
            bail!("Non triangular face detected ({} vertices)", indices.len());
        }
        tris.push(Triangle {
            indices: [indices[0], indices[1], indices[2]],
        });
    }

    Mesh::new(poss, nrms, tris)
}

fn read_vec3(element: &DefaultElement, names: [&str; 3]) -> SimpleResult<Vec3<f64>> {
    let mut v = [0.; 3];
    for (out, name) in v.iter_mut().zip(names.iter()) {
        *out = match element.get(*name) {
            Some(prop) => scalar_to_f64(prop)?,
            None => bail!("Vertex without a {} property", name),
        };
    }
    Ok(Vec3::from_arr(v))
}

fn scalar_to_f64(prop: &Property) -> SimpleResult<f64> {
    Ok(match *prop {
        Property::Char(v) => v as f64,
        Property::UChar(v) => v as f64,
        Property::Short(v) => v as f64,
        Property::UShort(v) => v as f64,
        Property::Int(v) => v as f64,
        Property::UInt(v) => v as f64,
        Property::Float(v) => v as f64,
        Property::Double(v) => v,
        _ => bail!("Expected a scalar vertex property"),
    })
}

fn list_to_indices(prop: &Property) -> SimpleResult<Vec<u32>> {
    let signed = |v: &[i64]| -> SimpleResult<Vec<u32>> {
        let mut out = Vec::with_capacity(v.len());
        for &i in v {
            if i < 0 {
                bail!("Negative vertex index in face");
            }
            out.push(i as u32);
        }
        Ok(out)
    };
    match prop {
        Property::ListUChar(v) => Ok(v.iter().map(|&i| i as u32).collect()),
        Property::ListUShort(v) => Ok(v.iter().map(|&i| i as u32).collect()),
        Property::ListUInt(v) => Ok(v.clone()),
        Property::ListChar(v) => signed(&v.iter().map(|&i| i as i64).collect::<Vec<_>>()),
        Property::ListShort(v) => signed(&v.iter().map(|&i| i as i64).collect::<Vec<_>>()),
        Property::ListInt(v) => signed(&v.iter().map(|&i| i as i64).collect::<Vec<_>>()),
        _ => bail!("Face indices must be an integer list"),
    }
}
