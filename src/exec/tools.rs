use std::fmt;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

use crate::fs::Fs;
use crate::settings::{Resources, ToolPaths};

use super::{parse_assigned_cells, parse_gex_library_id, run_cmd, Error};

/// Reads per output fastq when re-deriving fastqs from a BAM.
const READS_PER_FASTQ: u64 = 75_000_000;

/// Numeric id of a library inside a `cellranger multi` BAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryId(pub u32);

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of cells the multiplexed run assigned to one hashing tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedCellCount(pub u64);

/// One invocation of `cellranger multi`.
#[derive(Debug)]
pub struct MultiRun<'a> {
    /// Pipestance id; output goes to `<work_dir>/<id>`
    pub id: &'a str,
    pub config: &'a Path,
    pub work_dir: &'a Path,
}

/// Everything the pipeline needs from the outside world besides the filesystem.
/// Calls block until the tool exits; there is no timeout.
pub trait ExternalTools {
    /// Run `cellranger multi`.
    fn multi(&self, run: &MultiRun) -> Result<()>;
    /// Re-derive per-library fastqs from `bam` into `out_dir`, which must not exist.
    fn bam_to_fastq(&self, bam: &Path, out_dir: &Path) -> Result<()>;
    /// Library id of the gene expression library recorded in `bam`'s header.
    fn gex_library_id(&self, bam: &Path) -> Result<LibraryId>;
    /// Cells assigned to the sample whose `metrics_summary.csv` is `metrics`.
    fn assigned_cells(&self, metrics: &Path) -> Result<AssignedCellCount>;
}

/// The real tools: Cell Ranger plus the `bamtofastq` and `samtools` it ships with.
pub struct CellRanger<'a> {
    paths: &'a ToolPaths,
    resources: Resources,
    dry_run: bool,
    fs: &'a Fs,
}

impl<'a> CellRanger<'a> {
    pub fn new(paths: &'a ToolPaths, resources: Resources, dry_run: bool, fs: &'a Fs) -> Self {
        Self {
            paths,
            resources,
            dry_run,
            fs,
        }
    }
}

impl ExternalTools for CellRanger<'_> {
    fn multi(&self, run: &MultiRun) -> Result<()> {
        let mem = self.resources.memory_gb.to_string();
        let mut cmd = Command::new(&self.paths.cellranger);
        cmd.current_dir(run.work_dir)
            .arg("multi")
            .arg(format!("--id={}", run.id))
            .arg(format!("--csv={}", run.config.display()))
            .arg("--disable-ui")
            .arg("--localcores")
            .arg(self.resources.threads.to_string())
            .arg("--localmem")
            .arg(&mem)
            .arg("--localvmem")
            .arg(&mem);
        if self.dry_run {
            cmd.arg("--dry");
        }
        run_cmd(&mut cmd, true).with_context(|| format!("while running cellranger multi for {}", run.id))?;
        Ok(())
    }

    fn bam_to_fastq(&self, bam: &Path, out_dir: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.paths.bamtofastq);
        cmd.arg("--traceback")
            .arg(format!("--nthreads={}", self.resources.threads))
            .arg(format!("--reads-per-fastq={READS_PER_FASTQ}"))
            .arg(bam)
            .arg(out_dir);
        run_cmd(&mut cmd, true).with_context(|| format!("while running bamtofastq on {bam:?}"))?;
        Ok(())
    }

    fn gex_library_id(&self, bam: &Path) -> Result<LibraryId> {
        let mut cmd = Command::new(&self.paths.samtools);
        cmd.arg("view").arg("-H").arg(bam);
        let header = run_cmd(&mut cmd, false)
            .with_context(|| format!("while reading header of {bam:?}"))?
            .stdout;
        parse_gex_library_id(&header).ok_or_else(|| {
            Error::MissingArtifact {
                what: "gene expression library id",
                path: bam.display().to_string(),
            }
            .into()
        })
    }

    fn assigned_cells(&self, metrics: &Path) -> Result<AssignedCellCount> {
        let text = self.fs.read_to_string(metrics)?;
        parse_assigned_cells(&text).ok_or_else(|| {
            Error::MissingArtifact {
                what: "\"Cells assigned to this sample\" metric",
                path: metrics.display().to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn tools(cellranger: &str) -> ToolPaths {
        ToolPaths {
            cellranger: PathBuf::from(cellranger),
            bamtofastq: PathBuf::from("bamtofastq"),
            samtools: PathBuf::from("samtools"),
        }
    }

    #[test]
    fn test_assigned_cells_from_metrics_file() -> Result<()> {
        let dir = tempdir()?;
        let metrics = dir.path().join("metrics_summary.csv");
        std::fs::write(
            &metrics,
            "Cells,Multiplexing Capture,,,Cells assigned to this sample,\"1,204\"\n",
        )?;
        let fs = Fs::new(dir.path());
        let paths = tools("cellranger");
        let cr = CellRanger::new(&paths, Resources::new(4, 8192), false, &fs);
        assert_eq!(cr.assigned_cells(&metrics)?, AssignedCellCount(1204));
        Ok(())
    }

    #[test]
    fn test_missing_metric_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let metrics = dir.path().join("metrics_summary.csv");
        std::fs::write(&metrics, "Cells,Gene Expression,,,Cells,812\n")?;
        let fs = Fs::new(dir.path());
        let paths = tools("cellranger");
        let cr = CellRanger::new(&paths, Resources::new(4, 8192), false, &fs);
        let err = cr.assigned_cells(&metrics).unwrap_err();
        assert!(err.to_string().contains("Cells assigned to this sample"), "{err}");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_multi_exit_status() -> Result<()> {
        let dir = tempdir()?;
        let config = dir.path().join("config.csv");
        let fs = Fs::new(dir.path());
        let run = MultiRun {
            id: "S1",
            config: &config,
            work_dir: dir.path(),
        };

        let ok = tools("true");
        CellRanger::new(&ok, Resources::new(2, 4096), false, &fs).multi(&run)?;

        let failing = tools("false");
        let err = CellRanger::new(&failing, Resources::new(2, 4096), true, &fs)
            .multi(&run)
            .unwrap_err();
        assert!(format!("{err:#}").contains("cellranger multi for S1"), "{err:#}");
        Ok(())
    }
}
