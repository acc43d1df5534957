use std::fmt;
use std::path::PathBuf;

/// The library types `cellranger multi` can combine for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LibraryType {
    GeneExpression,
    Vdj,
    MultiplexingCapture,
    AntibodyCapture,
}

impl LibraryType {
    /// Value of the `feature_types` column in the `[libraries]` section.
    /// VDJ libraries use their configured chain type instead (e.g. "VDJ-T").
    pub fn feature_type(&self) -> &'static str {
        match self {
            Self::GeneExpression => "Gene Expression",
            Self::Vdj => "VDJ",
            Self::MultiplexingCapture => "Multiplexing Capture",
            Self::AntibodyCapture => "Antibody Capture",
        }
    }
}

impl fmt::Display for LibraryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.feature_type())
    }
}

#[derive(Debug, Clone)]
pub struct GexLibrary {
    /// Sample sheet column holding the GEX fastq id
    pub id_column: String,
    pub reference: PathBuf,
    pub include_introns: bool,
    pub no_bam: bool,
    pub cmo_set: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct VdjLibrary {
    /// Sample sheet column holding the VDJ fastq id
    pub id_column: String,
    pub reference: PathBuf,
    /// Feature type written for the VDJ library, e.g. "VDJ-T" or "VDJ-B"
    pub library_type: String,
}

#[derive(Debug, Clone)]
pub struct MultiplexingLibrary {
    /// Sample sheet column holding the multiplexing capture fastq id
    pub id_column: String,
    /// Sample sheet column holding comma-separated hashing tags
    pub hashing_tag_column: String,
}

#[derive(Debug, Clone)]
pub struct AntibodyLibrary {
    /// Sample sheet column holding the antibody capture fastq id
    pub id_column: String,
    pub feature_reference: PathBuf,
}

/// Which library types are enabled for this run, and how to find their values.
/// A library type is enabled iff its field is `Some`.
#[derive(Debug, Clone)]
pub struct Libraries {
    pub sample_id_column: String,
    pub cell_count_column: Option<String>,
    pub gex: Option<GexLibrary>,
    pub vdj: Option<VdjLibrary>,
    pub multiplexing: Option<MultiplexingLibrary>,
    pub antibody: Option<AntibodyLibrary>,
}

impl Libraries {
    /// Enabled library types, in config order.
    pub fn enabled(&self) -> Vec<LibraryType> {
        let mut enabled = Vec::with_capacity(4);
        if self.gex.is_some() {
            enabled.push(LibraryType::GeneExpression);
        }
        if self.vdj.is_some() {
            enabled.push(LibraryType::Vdj);
        }
        if self.multiplexing.is_some() {
            enabled.push(LibraryType::MultiplexingCapture);
        }
        if self.antibody.is_some() {
            enabled.push(LibraryType::AntibodyCapture);
        }
        enabled
    }
}

#[cfg(test)]
impl Libraries {
    /// All four library types enabled, with the columns used by the test sheets.
    pub(crate) fn for_tests() -> Self {
        Self {
            sample_id_column: "Sample ID".to_owned(),
            cell_count_column: Some("Cell Count".to_owned()),
            gex: Some(GexLibrary {
                id_column: "GEX ID".to_owned(),
                reference: PathBuf::from("/refs/GRCh38"),
                include_introns: true,
                no_bam: false,
                cmo_set: None,
            }),
            vdj: Some(VdjLibrary {
                id_column: "VDJ ID".to_owned(),
                reference: PathBuf::from("/refs/vdj_GRCh38"),
                library_type: "VDJ-T".to_owned(),
            }),
            multiplexing: Some(MultiplexingLibrary {
                id_column: "CMO ID".to_owned(),
                hashing_tag_column: "Hashtags".to_owned(),
            }),
            antibody: Some(AntibodyLibrary {
                id_column: "AB ID".to_owned(),
                feature_reference: PathBuf::from("/refs/features.csv"),
            }),
        }
    }
}
