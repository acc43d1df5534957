use std::path::{Path, PathBuf};

use sheet::{BAM2FQ_SUFFIX, DEMUX_SUFFIX};

/// Where the passes of one sample read and write inside the working directory.
#[derive(Debug, Clone, Copy)]
pub struct WorkLayout<'a> {
    work_dir: &'a Path,
    sample: &'a str,
}

impl<'a> WorkLayout<'a> {
    pub fn new(work_dir: &'a Path, sample: &'a str) -> Self {
        Self { work_dir, sample }
    }

    /// $WORK/<sample>_gex_cellmux_config.csv
    pub fn first_pass_config(&self) -> PathBuf {
        self.work_dir
            .join(format!("{}_gex_cellmux_config.csv", self.sample))
    }

    /// $WORK/<sample>, the pipestance of the multiplexed run
    pub fn first_pass_pipestance(&self) -> PathBuf {
        self.work_dir.join(self.sample)
    }

    /// $WORK/<sample>/outs
    pub fn first_pass_outs(&self) -> PathBuf {
        self.first_pass_pipestance().join("outs")
    }

    /// $WORK/<sample>/outs/per_sample_outs/<tag>
    fn per_sample_outs(&self, tag: &str) -> PathBuf {
        let mut path = self.first_pass_outs();
        path.push("per_sample_outs");
        path.push(tag);
        path
    }

    /// $WORK/<sample>/outs/per_sample_outs/<tag>/count/sample_alignments.bam
    pub fn tag_bam(&self, tag: &str) -> PathBuf {
        let mut path = self.per_sample_outs(tag);
        path.push("count");
        path.push("sample_alignments.bam");
        path
    }

    /// $WORK/<sample>/outs/per_sample_outs/<tag>/metrics_summary.csv
    pub fn tag_metrics(&self, tag: &str) -> PathBuf {
        self.per_sample_outs(tag).join("metrics_summary.csv")
    }

    /// <sample>_BAM2FQ
    pub fn bam2fq_name(&self) -> String {
        format!("{}_{BAM2FQ_SUFFIX}", self.sample)
    }

    /// $WORK/<sample>_BAM2FQ
    pub fn bam2fq_root(&self) -> PathBuf {
        self.work_dir.join(self.bam2fq_name())
    }

    /// $WORK/<sample>_BAM2FQ/<tag>
    pub fn bam2fq_tag(&self, tag: &str) -> PathBuf {
        self.bam2fq_root().join(tag)
    }

    /// Prefix of the re-derived folder holding library `library_id`: "<sample>_<id>_"
    pub fn rederived_prefix(&self, library_id: u32) -> String {
        format!("{}_{}_", self.sample, library_id)
    }

    /// <sample>_<tag>, the pipestance id of a tag pass and its name in the task folder
    pub fn tag_id(&self, tag: &str) -> String {
        format!("{}_{}", self.sample, tag)
    }

    /// $WORK/<sample>_<tag>_vdj_fb_config.csv
    pub fn tag_pass_config(&self, tag: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}_vdj_fb_config.csv", self.tag_id(tag)))
    }

    /// $WORK/<sample>_<tag>
    pub fn tag_pipestance(&self, tag: &str) -> PathBuf {
        self.work_dir.join(self.tag_id(tag))
    }

    /// Name of the multiplexed run's outs in the task folder: <sample>_DEMUX,
    /// or just <sample> when there were no tag passes.
    pub fn demux_name(&self, has_tags: bool) -> String {
        if has_tags {
            format!("{}_{DEMUX_SUFFIX}", self.sample)
        } else {
            self.sample.to_owned()
        }
    }
}
