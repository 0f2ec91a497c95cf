//! Writing snapshots of the solution.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use itertools::Itertools;

use crate::{discretization::Discretization, error::Result, field::Field};

/// Receiver of solution snapshots.
pub trait OutputSink {
    /// Record the named fields at the given step.
    fn write_snapshot(
        &mut self,
        step: usize,
        disc: &Discretization,
        fields: &[(&str, &Field)],
    ) -> Result<()>;
}

/// Discards every snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn write_snapshot(&mut self, _: usize, _: &Discretization, _: &[(&str, &Field)]) -> Result<()> {
        Ok(())
    }
}

/// VTK cell type id of a bilinear quadrilateral.
const VTK_QUAD: u8 = 9;

/// Writes each snapshot to `solution-<step>.vtu` in a directory,
/// as an ASCII VTK unstructured grid with one point per degree of freedom.
#[derive(Clone, Debug)]
pub struct VtuWriter {
    directory: PathBuf,
}

impl VtuWriter {
    /// Write into the given directory, creating it if needed.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// Path of the file for a step.
    pub fn path(&self, step: usize) -> PathBuf {
        self.directory.join(format!("solution-{step:03}.vtu"))
    }
}

impl OutputSink for VtuWriter {
    fn write_snapshot(
        &mut self,
        step: usize,
        disc: &Discretization,
        fields: &[(&str, &Field)],
    ) -> Result<()> {
        for (_, field) in fields {
            disc.check(field)?;
        }
        let mut w = BufWriter::new(File::create(self.path(step))?);
        write_vtu(&mut w, disc, fields)?;
        w.flush()?;
        Ok(())
    }
}

fn write_vtu(
    w: &mut impl Write,
    disc: &Discretization,
    fields: &[(&str, &Field)],
) -> std::io::Result<()> {
    let cells = disc.cells();
    writeln!(w, r#"<?xml version="1.0"?>"#)?;
    writeln!(
        w,
        r#"<VTKFile type="UnstructuredGrid" version="0.1" byte_order="LittleEndian">"#
    )?;
    writeln!(w, r#"  <UnstructuredGrid>"#)?;
    writeln!(
        w,
        r#"    <Piece NumberOfPoints="{}" NumberOfCells="{}">"#,
        disc.n_dofs(),
        cells.len()
    )?;

    writeln!(w, r#"      <Points>"#)?;
    writeln!(
        w,
        r#"        <DataArray type="Float64" NumberOfComponents="3" format="ascii">"#
    )?;
    for p in disc.support_points() {
        writeln!(w, "          {} {} 0", p.x, p.y)?;
    }
    writeln!(w, r#"        </DataArray>"#)?;
    writeln!(w, r#"      </Points>"#)?;

    writeln!(w, r#"      <Cells>"#)?;
    writeln!(
        w,
        r#"        <DataArray type="Int64" Name="connectivity" format="ascii">"#
    )?;
    for cell in cells {
        // VTK wants the corners in counterclockwise order
        let [a, b, c, d] = cell.dofs;
        writeln!(w, "          {a} {b} {d} {c}")?;
    }
    writeln!(w, r#"        </DataArray>"#)?;
    writeln!(
        w,
        r#"        <DataArray type="Int64" Name="offsets" format="ascii">"#
    )?;
    writeln!(w, "          {}", (1..=cells.len()).map(|i| 4 * i).join(" "))?;
    writeln!(w, r#"        </DataArray>"#)?;
    writeln!(
        w,
        r#"        <DataArray type="UInt8" Name="types" format="ascii">"#
    )?;
    writeln!(w, "          {}", cells.iter().map(|_| VTK_QUAD).join(" "))?;
    writeln!(w, r#"        </DataArray>"#)?;
    writeln!(w, r#"      </Cells>"#)?;

    writeln!(w, r#"      <PointData>"#)?;
    for (name, field) in fields {
        writeln!(
            w,
            r#"        <DataArray type="Float64" Name="{name}" format="ascii">"#
        )?;
        writeln!(w, "          {}", field.values.iter().join(" "))?;
        writeln!(w, r#"        </DataArray>"#)?;
    }
    writeln!(w, r#"      </PointData>"#)?;

    writeln!(w, r#"      <CellData>"#)?;
    writeln!(
        w,
        r#"        <DataArray type="Int32" Name="level" format="ascii">"#
    )?;
    writeln!(w, "          {}", cells.iter().map(|c| c.level).join(" "))?;
    writeln!(w, r#"        </DataArray>"#)?;
    writeln!(w, r#"      </CellData>"#)?;

    writeln!(w, r#"    </Piece>"#)?;
    writeln!(w, r#"  </UnstructuredGrid>"#)?;
    writeln!(w, r#"</VTKFile>"#)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::Generation, mesh::QuadMesh};

    #[test]
    fn vtu_contents() {
        let mut mesh = QuadMesh::hyper_cube(-1., 1.);
        mesh.refine_global(1);
        let disc = Discretization::build(&mesh, Generation(0));
        let u = disc.interpolate(|p| p.x);

        let mut buf = Vec::new();
        write_vtu(&mut buf, &disc, &[("U", &u)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains(r#"NumberOfPoints="9" NumberOfCells="4""#));
        assert!(text.contains(r#"Name="U""#));
        assert!(text.contains("4 8 12 16"));
        assert!(text.contains("9 9 9 9"));
        // the first cell in counterclockwise order: (-1,-1), (0,-1), (0,0), (-1,0)
        assert!(text.contains("          0 3 4 1\n"));
    }

    #[test]
    fn files_are_numbered_by_step() {
        let dir = std::env::temp_dir().join(format!("wave-vtu-{}", std::process::id()));
        let mut writer = VtuWriter::new(&dir).unwrap();
        assert!(writer.path(7).ends_with("solution-007.vtu"));
        assert!(writer.path(321).ends_with("solution-321.vtu"));

        let mut mesh = QuadMesh::hyper_cube(0., 1.);
        mesh.refine_global(1);
        let disc = Discretization::build(&mesh, Generation(2));
        let u = disc.new_zero_field();
        writer.write_snapshot(3, &disc, &[("U", &u)]).unwrap();
        assert!(writer.path(3).exists());

        let stale = Field::zeros(disc.n_dofs(), Generation(1));
        assert!(writer.write_snapshot(4, &disc, &[("U", &stale)]).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
