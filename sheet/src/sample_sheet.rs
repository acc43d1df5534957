use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::{Error, Libraries, BAM2FQ_SUFFIX, DEMUX_SUFFIX, TAG_DELIM};

/// Cell values that count as "no value given".
const MISSING_VALUES: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// A tab-separated sample sheet: one header line, then one row per sample.
#[derive(Debug)]
pub struct SampleSheet {
    headers: Vec<String>,
    records: Vec<StringRecord>,
}

impl SampleSheet {
    /// Read a sample sheet from a `.tsv` file.
    pub fn from_path<T: AsRef<Path>>(path: T) -> Result<Self, Error> {
        let rdr = reader_builder().from_path(path.as_ref())?;
        Self::from_csv(rdr)
    }

    /// Read a sample sheet from any reader (used in tests).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        Self::from_csv(reader_builder().from_reader(reader))
    }

    fn from_csv<R: Read>(mut rdr: csv::Reader<R>) -> Result<Self, Error> {
        let headers = rdr.headers()?.iter().map(str::to_owned).collect();
        let records = rdr.records().collect::<Result<Vec<_>, _>>()?;
        log::debug!("read sample sheet with {} rows", records.len());
        Ok(Self { headers, records })
    }

    /// Number of samples (rows excluding the header).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the sheet has no sample rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Get the row owned by the task with the given index.
    pub fn row(&self, index: usize) -> Result<Row<'_>, Error> {
        let record = self.records.get(index).ok_or(Error::RowOutOfRange {
            index,
            rows: self.records.len(),
        })?;
        Ok(Row {
            headers: &self.headers,
            record,
        })
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    // short rows are allowed; trailing cells read as missing.
    builder
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All);
    builder
}

/// One sample-sheet row, with lookups by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    headers: &'a [String],
    record: &'a StringRecord,
}

impl<'a> Row<'a> {
    /// Value of `column`, or an error listing all available columns.
    pub fn get(&self, column: &str) -> Result<&'a str, Error> {
        let pos = self
            .headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| Error::MissingColumn {
                column: column.to_owned(),
                available: self.headers.to_vec(),
            })?;
        Ok(self.record.get(pos).unwrap_or(""))
    }

    /// Hashing tags in `column`, split on commas. Empty entries are dropped.
    pub fn hashing_tags(&self, column: &str) -> Result<Vec<&'a str>, Error> {
        Ok(self
            .get(column)?
            .split(TAG_DELIM)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect())
    }

    /// Explicit cell count in `column`. `None` means missing, which is distinct from zero.
    pub fn cell_count(&self, column: &str) -> Result<Option<u64>, Error> {
        let value = self.get(column)?;
        if MISSING_VALUES.contains(&value) {
            return Ok(None);
        }
        let invalid = || Error::InvalidCellCount {
            column: column.to_owned(),
            value: value.to_owned(),
        };
        if let Ok(count) = value.parse::<u64>() {
            return Ok(Some(count));
        }
        // spreadsheet exports sometimes write integer columns as "500.0":
        let float: f64 = value.parse().map_err(|_| invalid())?;
        if float >= 0.0 && float.fract() == 0.0 {
            Ok(Some(float as u64))
        } else {
            Err(invalid())
        }
    }

    /// (column, value) pairs, for printing.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let record = self.record;
        self.headers
            .iter()
            .enumerate()
            .map(move |(i, h)| (h.as_str(), record.get(i).unwrap_or("")))
    }
}

/// Fastq ids of the enabled libraries, read from their id columns.
/// An id is `Some` iff its library type is enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct FastqIds<'a> {
    pub gex: Option<&'a str>,
    pub vdj: Option<&'a str>,
    pub multiplexing: Option<&'a str>,
    pub antibody: Option<&'a str>,
}

/// The parts of a row that drive the passes of one sample.
#[derive(Debug)]
pub struct Sample<'a> {
    pub id: &'a str,
    /// Hashing tags; empty unless multiplexing capture is enabled.
    pub tags: Vec<&'a str>,
    /// Explicit cell count from the sheet, if any.
    pub cell_count: Option<u64>,
    pub fastq_ids: FastqIds<'a>,
}

impl<'a> Sample<'a> {
    /// Pull everything any pass of the sample needs out of `row`, so that a
    /// bad sheet fails before the first tool runs.
    pub fn from_row(row: Row<'a>, libraries: &Libraries) -> Result<Self, Error> {
        let id = row.get(&libraries.sample_id_column)?;
        let tags = match &libraries.multiplexing {
            Some(mux) => row.hashing_tags(&mux.hashing_tag_column)?,
            None => Vec::with_capacity(0),
        };
        check_tags(&tags)?;
        let cell_count = match &libraries.cell_count_column {
            Some(column) => row.cell_count(column)?,
            None => None,
        };
        let lookup = |column: Option<&String>| column.map(|c| row.get(c)).transpose();
        let fastq_ids = FastqIds {
            gex: lookup(libraries.gex.as_ref().map(|l| &l.id_column))?,
            vdj: lookup(libraries.vdj.as_ref().map(|l| &l.id_column))?,
            multiplexing: lookup(libraries.multiplexing.as_ref().map(|l| &l.id_column))?,
            antibody: lookup(libraries.antibody.as_ref().map(|l| &l.id_column))?,
        };
        Ok(Self {
            id,
            tags,
            cell_count,
            fastq_ids,
        })
    }

    /// `force-cells` for a tag pass: the sheet's explicit count wins over `assigned`.
    /// `assigned` is only consulted when the sheet gives no count.
    pub fn force_cells<E>(&self, assigned: impl FnOnce() -> Result<u64, E>) -> Result<u64, E> {
        match self.cell_count {
            Some(count) => Ok(count),
            None => assigned(),
        }
    }
}

/// Each tag names a folder `<sample>_<tag>` in the task folder, so tags must
/// be unique and must not take the names of the multiplexed run's outputs.
fn check_tags(tags: &[&str]) -> Result<(), Error> {
    for (i, tag) in tags.iter().enumerate() {
        if [DEMUX_SUFFIX, BAM2FQ_SUFFIX].contains(tag) {
            return Err(Error::ReservedTag(tag.to_string()));
        }
        if tags[..i].contains(tag) {
            return Err(Error::DuplicateTag(tag.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    const SHEET: &str = "Sample ID\tGEX ID\tCMO ID\tHashtags\tCell Count\n\
                         S1\tgex1\tcmo1\tHT1,HT2,HT3\t500\n\
                         S2\tgex2\tcmo2\tA, B\t\n\
                         S3\tgex3\n";

    /// Gene expression and multiplexing capture, as in `SHEET`.
    fn gex_mux() -> Libraries {
        let mut libraries = Libraries::for_tests();
        libraries.vdj = None;
        libraries.antibody = None;
        libraries
    }

    fn sheet() -> Result<SampleSheet> {
        Ok(SampleSheet::from_reader(SHEET.as_bytes())?)
    }

    #[test]
    fn test_read_rows() -> Result<()> {
        let sheet = sheet()?;
        assert_eq!(sheet.len(), 3);
        assert_eq!(sheet.headers()[0], "Sample ID");
        assert_eq!(sheet.row(1)?.get("GEX ID")?, "gex2");
        Ok(())
    }

    #[test]
    fn test_row_out_of_range() -> Result<()> {
        let sheet = sheet()?;
        match sheet.row(3) {
            Err(Error::RowOutOfRange { index: 3, rows: 3 }) => Ok(()),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_missing_column_lists_available() -> Result<()> {
        let sheet = sheet()?;
        let err = sheet.row(0)?.get("VDJ ID").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'VDJ ID'"));
        assert!(msg.contains("Sample ID"));
        assert!(msg.contains("Cell Count"));
        Ok(())
    }

    #[test]
    fn test_hashing_tags() -> Result<()> {
        let sheet = sheet()?;
        assert_eq!(sheet.row(0)?.hashing_tags("Hashtags")?, ["HT1", "HT2", "HT3"]);
        assert_eq!(sheet.row(1)?.hashing_tags("Hashtags")?, ["A", "B"]);
        assert!(sheet.row(2)?.hashing_tags("Hashtags")?.is_empty());
        Ok(())
    }

    #[test]
    fn test_cell_count_missing_vs_zero() -> Result<()> {
        let text = "id\tcells\na\t0\nb\t\nc\tNaN\nd\t500.0\ne\tmany\n";
        let sheet = SampleSheet::from_reader(text.as_bytes())?;
        assert_eq!(sheet.row(0)?.cell_count("cells")?, Some(0));
        assert_eq!(sheet.row(1)?.cell_count("cells")?, None);
        assert_eq!(sheet.row(2)?.cell_count("cells")?, None);
        assert_eq!(sheet.row(3)?.cell_count("cells")?, Some(500));
        assert!(matches!(
            sheet.row(4)?.cell_count("cells"),
            Err(Error::InvalidCellCount { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_explicit_cell_count_wins() -> Result<()> {
        let sheet = sheet()?;
        let libraries = gex_mux();
        let explicit = Sample::from_row(sheet.row(0)?, &libraries)?;
        assert_eq!(explicit.cell_count, Some(500));
        assert_eq!(explicit.force_cells(|| Ok::<_, Error>(1234))?, 500);

        let inferred = Sample::from_row(sheet.row(1)?, &libraries)?;
        assert_eq!(inferred.cell_count, None);
        assert_eq!(inferred.force_cells(|| Ok::<_, Error>(1234))?, 1234);
        Ok(())
    }

    #[test]
    fn test_fastq_ids_of_enabled_libraries() -> Result<()> {
        let text = "Sample ID\tGEX ID\tVDJ ID\tCMO ID\tAB ID\tHashtags\tCell Count\n\
                    S1\tgex1\tvdj1\tcmo1\tab1\tA\t\n";
        let sheet = SampleSheet::from_reader(text.as_bytes())?;
        let mut libraries = Libraries::for_tests();
        libraries.antibody = None;
        let sample = Sample::from_row(sheet.row(0)?, &libraries)?;
        assert_eq!(sample.fastq_ids.gex, Some("gex1"));
        assert_eq!(sample.fastq_ids.vdj, Some("vdj1"));
        assert_eq!(sample.fastq_ids.multiplexing, Some("cmo1"));
        assert_eq!(sample.fastq_ids.antibody, None);
        Ok(())
    }

    #[test]
    fn test_missing_vdj_column_fails_on_read() -> Result<()> {
        // the default sheet has no VDJ or antibody columns:
        let sheet = sheet()?;
        let libraries = Libraries::for_tests();
        match Sample::from_row(sheet.row(0)?, &libraries) {
            Err(Error::MissingColumn { column, .. }) => assert_eq!(column, "VDJ ID"),
            other => panic!("unexpected result {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_reserved_and_duplicate_tags() -> Result<()> {
        let text = "Sample ID\tGEX ID\tCMO ID\tHashtags\n\
                    S1\tgex1\tcmo1\tA,DEMUX\n\
                    S2\tgex2\tcmo2\tBAM2FQ\n\
                    S3\tgex3\tcmo3\tA,B,A\n";
        let sheet = SampleSheet::from_reader(text.as_bytes())?;
        let mut libraries = gex_mux();
        libraries.cell_count_column = None;

        for row in [0, 1] {
            assert!(matches!(
                Sample::from_row(sheet.row(row)?, &libraries),
                Err(Error::ReservedTag(_))
            ));
        }
        assert!(matches!(
            Sample::from_row(sheet.row(2)?, &libraries),
            Err(Error::DuplicateTag(tag)) if tag == "A"
        ));
        Ok(())
    }
}
