use anyhow::Result;
use cellranger_multipass::{App, Args};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn stringify(path: &Path) -> String {
    path.to_str().unwrap().to_owned()
}

fn run(args: &[&str]) -> Result<()> {
    simple_logging::log_to_stderr(log::LevelFilter::Trace);
    let args = Args::try_parse_from(args)?;
    let settings = args.try_into()?;
    let app = App::new(settings);
    app.run()
}

fn write_sheet(dir: &Path, rows: &[&str]) -> Result<PathBuf> {
    let path = dir.join("sheet.tsv");
    let mut text = String::from("Sample\tGEX\tCMO\tTags\n");
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    fs::write(&path, text)?;
    Ok(path)
}

#[test]
fn test_pre_stages_inputs() -> Result<()> {
    let shared = tempdir()?;
    let inputs = tempdir()?;
    let sheet = write_sheet(inputs.path(), &["S1\tgex1\tcmo1\tA,B", "S2\tgex2\tcmo2\tC"])?;
    let mut paths = Vec::new();
    for name in ["S1_R1.fq.gz", "S1_R2.fq.gz", "S2_R1.fastq.gz", "S2_R2.fastq.gz"] {
        let path = inputs.path().join(name);
        fs::write(&path, name)?;
        paths.push(stringify(&path));
    }

    let shared_arg = stringify(shared.path());
    let sheet_arg = stringify(&sheet);
    let mut args = vec![
        "crmp",
        "-v",
        "-s",
        shared_arg.as_str(),
        "pre",
        "--sample-sheet",
        sheet_arg.as_str(),
        "--files-per-sample",
        "2",
    ];
    for path in &paths {
        args.extend(["--input", path.as_str()]);
    }
    run(&args)?;

    let staged = shared.path().join("fastq_input");
    let mut names: Vec<String> = fs::read_dir(&staged)?
        .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<Result<_, _>>()?;
    names.sort();
    assert_eq!(
        names,
        ["S1_R1.fastq.gz", "S1_R2.fastq.gz", "S2_R1.fastq.gz", "S2_R2.fastq.gz"]
    );
    assert_eq!(fs::read_to_string(staged.join("S1_R1.fastq.gz"))?, "S1_R1.fq.gz");
    Ok(())
}

#[test]
fn test_pre_rejects_wrong_input_count() -> Result<()> {
    let shared = tempdir()?;
    let inputs = tempdir()?;
    let sheet = write_sheet(inputs.path(), &["S1\tgex1\tcmo1\tA"])?;
    let input = inputs.path().join("S1_R1.fq.gz");
    fs::write(&input, "")?;

    let (shared_arg, sheet_arg, input_arg) =
        (stringify(shared.path()), stringify(&sheet), stringify(&input));
    let res = run(&[
        "crmp",
        "-s",
        shared_arg.as_str(),
        "pre",
        "--sample-sheet",
        sheet_arg.as_str(),
        "--files-per-sample",
        "2",
        "--input",
        input_arg.as_str(),
    ]);
    let msg = format!("{:#}", res.unwrap_err());
    assert!(msg.contains("expected 2 input files"), "{msg}");
    assert!(!shared.path().join("fastq_input").exists());
    Ok(())
}

#[test]
fn test_failed_main_task_is_reported() -> Result<()> {
    let shared = tempdir()?;
    let work = tempdir()?;
    let sheet = write_sheet(work.path(), &["S1\tgex1\tcmo1\tA"])?;

    let (shared_arg, work_arg, sheet_arg) = (
        stringify(shared.path()),
        stringify(&work.path().join("run")),
        stringify(&sheet),
    );
    // task 3 has no sample sheet row, so the task fails before any tool runs:
    let main_args = [
        "crmp",
        "-s",
        shared_arg.as_str(),
        "main",
        "--task-index",
        "3",
        "--track-indices",
        "3,4",
        "--max-threads",
        "4",
        "--max-memory",
        "8192",
        "--sample-sheet",
        sheet_arg.as_str(),
        "--work-dir",
        work_arg.as_str(),
        "--sample-id-column",
        "Sample",
        "--gex",
        "true",
        "--gex-id-column",
        "GEX",
        "--gex-reference",
        "/refs/GRCh38",
        "--cellranger-dir",
        "/opt/cellranger",
        "--bamtofastq",
        "/opt/bamtofastq",
        "--samtools",
        "/opt/samtools",
    ];
    assert!(run(&main_args).is_err());

    let failed = shared.path().join("__failed_tracks__");
    for track in ["3", "4"] {
        let message = fs::read_to_string(failed.join(track).join("error_message.txt"))?;
        assert!(message.contains("no row for task index 3"), "{message}");
    }
    // the task folder was still set up for this attempt:
    assert!(shared.path().join("_task_outputs/3").is_dir());

    run(&["crmp", "-s", shared_arg.as_str(), "failed"])?;
    Ok(())
}

#[test]
fn test_post_collects_tasks() -> Result<()> {
    let shared = tempdir()?;
    let out = tempdir()?;
    for (index, entry) in [(0, "S1_DEMUX"), (0, "S1_A"), (1, "S2")] {
        let dir = shared.path().join("_task_outputs").join(index.to_string()).join(entry);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("web_summary.html"), entry)?;
        fs::write(dir.join("sample_alignments.bam"), "bam")?;
        fs::write(dir.join("sample_alignments.bam.bai"), "bai")?;
    }
    // a stale folder past a gap is never reached:
    fs::create_dir_all(shared.path().join("_task_outputs/3/S4"))?;

    let export = out.path().join("export");
    let generic = out.path().join("generic");
    let (shared_arg, export_arg, generic_arg) = (
        stringify(shared.path()),
        stringify(&export),
        stringify(&generic),
    );
    run(&[
        "crmp",
        "-s",
        shared_arg.as_str(),
        "post",
        "--generic-output",
        generic_arg.as_str(),
        "--export",
        "true",
        "--export-folder",
        export_arg.as_str(),
        "--export-exclude-bam",
        "true",
    ])?;

    for entry in ["S1_DEMUX", "S1_A", "S2"] {
        assert_eq!(fs::read_to_string(export.join(entry).join("web_summary.html"))?, entry);
        assert!(!export.join(entry).join("sample_alignments.bam").exists());
        assert!(!export.join(entry).join("sample_alignments.bam.bai").exists());

        let relocated = generic.join("cellranger_multi").join(entry);
        assert!(relocated.join("sample_alignments.bam").exists());
    }
    assert!(!export.join("S4").exists());
    assert!(shared.path().join("_task_outputs/3/S4").is_dir());
    Ok(())
}

#[test]
fn test_post_reports_failed_tracks_and_still_collects() -> Result<()> {
    let shared = tempdir()?;
    let out = tempdir()?;
    let failed = shared.path().join("__failed_tracks__/1");
    fs::create_dir_all(&failed)?;
    fs::write(failed.join("error_message.txt"), "cellranger exploded")?;
    let task = shared.path().join("_task_outputs/0/S1");
    fs::create_dir_all(&task)?;

    let generic = out.path().join("generic");
    let (shared_arg, generic_arg) = (stringify(shared.path()), stringify(&generic));
    run(&["crmp", "-s", shared_arg.as_str(), "post", "--generic-output", generic_arg.as_str()])?;

    assert!(generic.join("cellranger_multi/S1").is_dir());
    assert!(failed.join("error_message.txt").exists());
    Ok(())
}
