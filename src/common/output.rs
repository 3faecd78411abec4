use std::path::{Path, PathBuf};

/// Directory that receives the downloaded copies for a source PDF
/// "/papers/survey.pdf" + "_refs" -> "/papers/survey_refs"
pub fn output_dir_for<P: AsRef<Path>>(pdf_path: P, suffix: &str) -> PathBuf {
    let pdf_path = pdf_path.as_ref();
    let stem = pdf_path.file_stem().and_then(|s| s.to_str()).unwrap_or("references");
    let dirname = format!("{}{}", stem, suffix);

    match pdf_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.join(dirname),
        _ => PathBuf::from(dirname),
    }
}
