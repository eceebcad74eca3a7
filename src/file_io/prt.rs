// Plain text files holding the precomputed coefficients.
//
// light.txt has one line per SH index with the R, G and B coefficients. A transport file
// starts with the vertex count, followed by one line per triangle corner (three per triangle,
// in mesh order) holding that corner's whole coefficient vector. Values are written in their
// shortest exact form so reading a file back gives the same numbers.

use crate::integrator::{LightCoeffs, TransportCoeffs};
use crate::mesh::Mesh;
use crate::spectrum::Color;
use simple_error::{bail, try_with, SimpleResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn write_light(path: &Path, light: &LightCoeffs) -> SimpleResult<()> {
    let file = try_with!(File::create(path), "could not create {}", path.display());
    let mut out = BufWriter::new(file);
    for c in light.as_slice() {
        try_with!(
            writeln!(out, "{} {} {}", c.r, c.g, c.b),
            "could not write {}",
            path.display()
        );
    }
    try_with!(out.flush(), "could not write {}", path.display());
    Ok(())
}

pub fn write_transport(path: &Path, mesh: &Mesh, transport: &TransportCoeffs) -> SimpleResult<()> {
    if transport.num_vert() != mesh.num_vert() {
        bail!(
            "Transport has {} vertices but the mesh has {}",
            transport.num_vert(),
            mesh.num_vert()
        );
    }

    let file = try_with!(File::create(path), "could not create {}", path.display());
    let mut out = BufWriter::new(file);
    try_with!(
        writeln!(out, "{}", mesh.num_vert()),
        "could not write {}",
        path.display()
    );
    for tri in mesh.tris() {
        for &index in tri.indices.iter() {
            let line = transport
                .vertex(index)
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            try_with!(writeln!(out, "{}", line), "could not write {}", path.display());
        }
    }
    try_with!(out.flush(), "could not write {}", path.display());
    Ok(())
}

fn parse_line(line: &str, path: &Path, line_no: usize) -> SimpleResult<Vec<f64>> {
    let mut values = Vec::new();
    for token in line.split_ascii_whitespace() {
        values.push(try_with!(
            token.parse::<f64>(),
            "bad number \"{}\" on line {} of {}",
            token,
            line_no + 1,
            path.display()
        ));
    }
    Ok(values)
}

pub fn read_light(path: &Path) -> SimpleResult<LightCoeffs> {
    let text = try_with!(fs::read_to_string(path), "could not read {}", path.display());
    let mut coeffs = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let values = parse_line(line, path, line_no)?;
        if values.len() != 3 {
            bail!(
                "Line {} of {} has {} values, expected 3",
                line_no + 1,
                path.display(),
                values.len()
            );
        }
        coeffs.push(Color::new(values[0], values[1], values[2]));
    }
    Ok(LightCoeffs::from_vec(coeffs))
}

/// The contents of a transport file: the vertex count and every corner's coefficients.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportFile {
    pub num_vert: usize,
    pub corners: Vec<Vec<f64>>,
}

impl TransportFile {
    /// Rebuilds the per-vertex table, using `mesh` to tell which corner is which vertex.
    pub fn into_coeffs(self, mesh: &Mesh) -> SimpleResult<TransportCoeffs> {
        if self.num_vert != mesh.num_vert() || self.corners.len() != 3 * mesh.num_tri() {
            bail!("Transport file doesn't match the mesh");
        }
        let sh_len = self.corners.first().map_or(0, |c| c.len());
        let mut columns = vec![None; self.num_vert];
        for (corner, coeffs) in self.corners.into_iter().enumerate() {
            let index = mesh.get_tri(corner / 3).indices[corner % 3] as usize;
            columns[index] = Some(coeffs);
        }
        let columns = columns
            .into_iter()
            .map(|c| c.unwrap_or_else(|| vec![0.; sh_len]))
            .collect();
        TransportCoeffs::from_columns(sh_len, columns)
    }
}

pub fn read_transport(path: &Path) -> SimpleResult<TransportFile> {
    let text = try_with!(fs::read_to_string(path), "could not read {}", path.display());
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let num_vert = match lines.next() {
        Some((_, line)) => try_with!(
            line.trim().parse::<usize>(),
            "bad vertex count in {}",
            path.display()
        ),
        None => bail!("{} is empty", path.display()),
    };

    let mut corners: Vec<Vec<f64>> = Vec::new();
    for (line_no, line) in lines {
        let values = parse_line(line, path, line_no)?;
        if let Some(first) = corners.first() {
            if first.len() != values.len() {
                bail!(
                    "Line {} of {} has {} values, expected {}",
                    line_no + 1,
                    path.display(),
                    values.len(),
                    first.len()
                );
            }
        }
        corners.push(values);
    }
    if corners.len() % 3 != 0 {
        bail!("{} doesn't hold whole triangles", path.display());
    }

    Ok(TransportFile { num_vert, corners })
}
