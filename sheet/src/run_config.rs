use std::fmt;

/// Sections of a `cellranger multi` config, in the order they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Libraries,
    GeneExpression,
    Samples,
    Vdj,
    Feature,
}

impl SectionKind {
    /// Name inside the `[...]` header line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Libraries => "libraries",
            Self::GeneExpression => "gene-expression",
            Self::Samples => "samples",
            Self::Vdj => "vdj",
            Self::Feature => "feature",
        }
    }

    /// Column header row for table-style sections.
    fn column_header(&self) -> Option<&'static str> {
        match self {
            Self::Libraries => Some("fastq_id,fastqs,feature_types"),
            Self::Samples => Some("sample_id,cmo_ids"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    /// comma-separated rows, not including the column header
    pub rows: Vec<String>,
}

/// A complete config for one invocation of `cellranger multi`.
///
/// Sections only exist once a row has been added to them, so a library type
/// that contributes nothing leaves no trace in the rendered file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    sections: Vec<Section>,
}

impl RunConfig {
    /// Append a raw comma-separated row to section `kind`.
    pub fn push_row(&mut self, kind: SectionKind, row: String) {
        match self.sections.iter_mut().find(|s| s.kind == kind) {
            Some(section) => section.rows.push(row),
            None => self.sections.push(Section {
                kind,
                rows: vec![row],
            }),
        }
    }

    /// Append a `key,value` row to section `kind`.
    pub fn push_kv<V: fmt::Display>(&mut self, kind: SectionKind, key: &str, value: V) {
        self.push_row(kind, format!("{key},{value}"));
    }

    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Kinds of all non-empty sections, in file order.
    pub fn kinds(&self) -> Vec<SectionKind> {
        self.sections.iter().map(|s| s.kind).collect()
    }

    /// Value of `key` in a key-value section.
    pub fn value(&self, kind: SectionKind, key: &str) -> Option<&str> {
        self.section(kind)?.rows.iter().find_map(|row| {
            let (k, v) = row.split_once(',')?;
            (k == key).then_some(v)
        })
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            writeln!(f, "[{}]", section.kind.name())?;
            if let Some(header) = section.kind.column_header() {
                writeln!(f, "{header}")?;
            }
            for row in &section.rows {
                writeln!(f, "{row}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
