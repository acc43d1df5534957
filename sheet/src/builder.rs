use std::path::Path;

use crate::{Error, Libraries, LibraryType, RunConfig, Sample, SectionKind};

/// fastq id that `bamtofastq` output is registered under in the tag pass
const REDERIVED_FASTQ_ID: &str = "bamtofastq";

/// Builds the `cellranger multi` config for each pass of a sample.
#[derive(Debug)]
pub struct ConfigBuilder<'a> {
    libraries: &'a Libraries,
    /// Staged input fastqs, shared by every library
    fastq_dir: &'a Path,
}

impl<'a> ConfigBuilder<'a> {
    pub fn new(libraries: &'a Libraries, fastq_dir: &'a Path) -> Self {
        Self {
            libraries,
            fastq_dir,
        }
    }
}

impl ConfigBuilder<'_> {
    /// Config for the combined multiplexed run (pass 1).
    ///
    /// Only gene expression and multiplexing capture contribute here. VDJ and
    /// antibody capture are enabled on the sample but wait for the tag pass,
    /// once per-tag reads exist.
    pub fn first_pass(&self, sample: &Sample) -> RunConfig {
        let mut config = RunConfig::default();
        let libs = self.libraries;

        if let Some(fastq_id) = sample.fastq_ids.gex {
            self.push_library(&mut config, fastq_id, LibraryType::GeneExpression.feature_type());
        }
        if let Some(fastq_id) = sample.fastq_ids.multiplexing {
            self.push_library(
                &mut config,
                fastq_id,
                LibraryType::MultiplexingCapture.feature_type(),
            );
        }

        if let Some(gex) = &libs.gex {
            let section = SectionKind::GeneExpression;
            config.push_kv(section, "reference", gex.reference.display());
            config.push_kv(section, "include-introns", gex.include_introns);
            config.push_kv(section, "no-bam", gex.no_bam);
            if let Some(cmo_set) = &gex.cmo_set {
                config.push_kv(section, "cmo-set", cmo_set.display());
            }
            // with multiplexing, an explicit count is per tag and only applies to the tag pass:
            if libs.multiplexing.is_none() {
                if let Some(count) = sample.cell_count {
                    config.push_kv(section, "force-cells", count);
                }
            }
        }

        if libs.multiplexing.is_some() {
            for tag in &sample.tags {
                config.push_row(SectionKind::Samples, format!("{tag},{tag}"));
            }
        }

        config
    }

    /// Config for the per-tag multiomics run (pass 2), using the gene expression
    /// reads re-derived from pass 1 in `gex_fastqs`.
    pub fn tag_pass(
        &self,
        sample: &Sample,
        gex_fastqs: &Path,
        force_cells: u64,
    ) -> Result<RunConfig, Error> {
        let libs = self.libraries;
        let gex = libs
            .gex
            .as_ref()
            .ok_or(Error::LibraryNotEnabled(LibraryType::GeneExpression))?;

        let mut config = RunConfig::default();
        config.push_row(
            SectionKind::Libraries,
            format!(
                "{REDERIVED_FASTQ_ID},{},{}",
                gex_fastqs.display(),
                LibraryType::GeneExpression.feature_type()
            ),
        );
        if let (Some(vdj), Some(fastq_id)) = (&libs.vdj, sample.fastq_ids.vdj) {
            self.push_library(&mut config, fastq_id, &vdj.library_type);
        }
        if let Some(fastq_id) = sample.fastq_ids.antibody {
            self.push_library(&mut config, fastq_id, LibraryType::AntibodyCapture.feature_type());
        }

        let section = SectionKind::GeneExpression;
        config.push_kv(section, "reference", gex.reference.display());
        config.push_kv(section, "force-cells", force_cells);
        config.push_kv(section, "check-library-compatibility", false);

        if let Some(vdj) = &libs.vdj {
            config.push_kv(SectionKind::Vdj, "reference", vdj.reference.display());
        }
        if let Some(ab) = &libs.antibody {
            config.push_kv(
                SectionKind::Feature,
                "reference",
                ab.feature_reference.display(),
            );
        }

        Ok(config)
    }

    fn push_library(&self, config: &mut RunConfig, fastq_id: &str, feature_type: &str) {
        config.push_row(
            SectionKind::Libraries,
            format!("{fastq_id},{},{feature_type}", self.fastq_dir.display()),
        );
    }
}
