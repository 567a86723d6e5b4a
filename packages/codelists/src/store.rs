//! Codelist files on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use amcr_archive_models::FilterCategory;

use crate::CodelistError;
use crate::lookup::Lookup;

/// Static vocabularies shipped with the tool.
pub const STATIC_FILE: &str = "heslar.csv";

/// Lead investigators downloaded from the archive.
pub const DYNAMIC_FILE: &str = "vedouci.csv";

/// Header row written to codelist files.
pub const HEADER: [&str; 3] = ["Název", "Kód", "Kategorie"];

const DELIMITER: u8 = b';';

/// Label → code entries of each category.
pub type CategorizedEntries = BTreeMap<FilterCategory, BTreeMap<String, Option<String>>>;

/// The codelists of one directory, one shared [`Lookup`] per category.
#[derive(Debug, Clone)]
pub struct CodelistStore {
    dir: PathBuf,
    lookups: BTreeMap<FilterCategory, Lookup>,
}

impl CodelistStore {
    /// Loads both codelist files from `dir`.
    ///
    /// Missing files give empty lookups. A file that cannot be read is
    /// logged and skipped.
    #[must_use]
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let mut entries = load_all(&dir);

        let lookups = FilterCategory::ALL
            .into_iter()
            .map(|category| {
                let lookup = Lookup::from_entries(entries.remove(&category).unwrap_or_default());
                (category, lookup)
            })
            .collect();

        Self { dir, lookups }
    }

    /// Directory the codelists are read from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the downloaded lead-investigator list.
    #[must_use]
    pub fn dynamic_path(&self) -> PathBuf {
        self.dir.join(DYNAMIC_FILE)
    }

    /// Shared handle to one category's lookup.
    #[must_use]
    pub fn lookup(&self, category: FilterCategory) -> Lookup {
        self.lookups.get(&category).cloned().unwrap_or_default()
    }

    /// Code for `label` in `category`, or the label itself when no code is
    /// known.
    #[must_use]
    pub fn resolve(&self, category: FilterCategory, label: &str) -> String {
        self.lookups
            .get(&category)
            .map_or_else(|| label.to_string(), |lookup| lookup.resolve(label))
    }

    /// Re-reads the codelist files and replaces the lead-investigator
    /// lookup in place. Returns its new size.
    ///
    /// # Errors
    ///
    /// Returns [`CodelistError`] if the downloaded list exists but cannot
    /// be read.
    pub fn reload_dynamic(&self) -> Result<usize, CodelistError> {
        let mut entries = read_codelist(&self.dir.join(STATIC_FILE)).unwrap_or_else(|e| {
            log::warn!("Failed to read {STATIC_FILE}: {e}");
            CategorizedEntries::new()
        });
        merge(&mut entries, read_codelist(&self.dynamic_path())?);

        let leaders = entries.remove(&FilterCategory::Vedouci).unwrap_or_default();
        let count = leaders.len();
        self.lookup(FilterCategory::Vedouci).replace(leaders);
        log::info!("Reloaded {count} lead investigators");

        Ok(count)
    }
}

fn load_all(dir: &Path) -> CategorizedEntries {
    let mut entries = CategorizedEntries::new();
    for file in [STATIC_FILE, DYNAMIC_FILE] {
        match read_codelist(&dir.join(file)) {
            Ok(read) => merge(&mut entries, read),
            Err(e) => log::warn!("Failed to read {file}: {e}"),
        }
    }
    entries
}

fn merge(into: &mut CategorizedEntries, from: CategorizedEntries) {
    for (category, entries) in from {
        into.entry(category).or_default().extend(entries);
    }
}

/// Reads one codelist file.
///
/// The header row is skipped. Rows with fewer than three columns or an
/// unknown category are ignored; an empty code becomes `None`. A missing
/// file reads as empty.
///
/// # Errors
///
/// Returns [`CodelistError`] if the file exists but cannot be read or
/// parsed.
pub fn read_codelist(path: &Path) -> Result<CategorizedEntries, CodelistError> {
    let mut entries = CategorizedEntries::new();
    if !path.exists() {
        log::debug!("{} not found, skipping", path.display());
        return Ok(entries);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    for result in reader.records() {
        let record = result?;
        if record.len() < 3 {
            continue;
        }

        let label = record.get(0).unwrap_or("").trim();
        let code = record.get(1).unwrap_or("").trim();
        let category = record.get(2).unwrap_or("").trim();

        let Ok(category) = category.parse::<FilterCategory>() else {
            log::trace!("Skipping row with unknown category '{category}'");
            continue;
        };

        entries
            .entry(category)
            .or_default()
            .insert(label.to_string(), (!code.is_empty()).then(|| code.to_string()));
    }

    Ok(entries)
}

/// Writes `rows` as a codelist file with a header, replacing any existing
/// file. Returns the number of rows written.
///
/// Rows go to a temporary file in the same directory, which is renamed
/// over `path` only once fully written.
///
/// # Errors
///
/// Returns [`CodelistError`] if the file cannot be written. The existing
/// file is then left as it was.
pub fn write_codelist<'a, I>(path: &Path, rows: I) -> Result<usize, CodelistError>
where
    I: IntoIterator<Item = (&'a str, &'a str, FilterCategory)>,
{
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(tempfile::NamedTempFile::new_in(dir)?);
    writer.write_record(HEADER)?;

    let mut count = 0;
    for (label, code, category) in rows {
        writer.write_record([label, code, category.as_ref()])?;
        count += 1;
    }

    let file = writer.into_inner().map_err(csv::IntoInnerError::into_error)?;
    file.persist(path).map_err(|e| e.error)?;

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HESLAR: &str = "Název;Kód;Kategorie\n\
        Praha;CZ010;kraj\n\
        Středočeský kraj;CZ020;kraj\n\
        Neolit;HES-000100;obdobi\n\
        Neurčeno;;obdobi\n\
        Záchranný výzkum;HES-001135;typ_akce\n\
        bez kategorie;X\n\
        Neznámo;Y;neznama\n";

    fn write(dir: &Path, file: &str, text: &str) {
        std::fs::write(dir.join(file), text).unwrap();
    }

    #[test]
    fn reads_categories_and_empty_codes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), STATIC_FILE, HESLAR);

        let store = CodelistStore::open(dir.path());

        assert_eq!(store.lookup(FilterCategory::Kraj).len(), 2);
        assert_eq!(store.resolve(FilterCategory::Kraj, "Praha"), "CZ010");
        assert_eq!(store.resolve(FilterCategory::TypAkce, "Záchranný výzkum"), "HES-001135");
        assert!(store.lookup(FilterCategory::Obdobi).contains("Neurčeno"));
        assert_eq!(store.resolve(FilterCategory::Obdobi, "Neurčeno"), "Neurčeno");
        assert!(store.lookup(FilterCategory::Okres).is_empty());
    }

    #[test]
    fn missing_files_give_empty_lookups() {
        let dir = tempfile::tempdir().unwrap();

        let store = CodelistStore::open(dir.path().join("absent"));

        for category in FilterCategory::ALL {
            assert!(store.lookup(category).is_empty());
        }
    }

    #[test]
    fn dynamic_file_fills_leader_lookup() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), STATIC_FILE, HESLAR);
        write(
            dir.path(),
            DYNAMIC_FILE,
            "Název;Kód;Kategorie\nNovák, Jan;Novák, Jan;vedouci\n",
        );

        let store = CodelistStore::open(dir.path());

        assert_eq!(
            store.resolve(FilterCategory::Vedouci, "Novák, Jan"),
            "Novák, Jan"
        );
        assert_eq!(store.lookup(FilterCategory::Kraj).len(), 2);
    }

    #[test]
    fn reload_replaces_leaders_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = CodelistStore::open(dir.path());
        let held = store.lookup(FilterCategory::Vedouci);
        assert!(held.is_empty());

        write_codelist(
            &store.dynamic_path(),
            [
                ("Novák, Jan", "Novák, Jan", FilterCategory::Vedouci),
                ("Dvořák, Petr", "Dvořák, Petr", FilterCategory::Vedouci),
            ],
        )
        .unwrap();

        assert_eq!(store.reload_dynamic().unwrap(), 2);
        assert_eq!(held.len(), 2);
        assert_eq!(held.resolve("Dvořák, Petr"), "Dvořák, Petr");
    }

    #[test]
    fn rewrite_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DYNAMIC_FILE);
        std::fs::write(&path, "Název;Kód;Kategorie\nStarý;Starý;vedouci\n").unwrap();

        write_codelist(&path, [("Nový", "Nový", FilterCategory::Vedouci)]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Nový"));
        assert!(!text.contains("Starý"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_rewrite_leaves_target_and_directory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(DYNAMIC_FILE);
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "kept").unwrap();

        let result = write_codelist(&target, [("Nový", "Nový", FilterCategory::Vedouci)]);

        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(target.join("keep")).unwrap(), "kept");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn written_files_read_back_with_header_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DYNAMIC_FILE);

        let written =
            write_codelist(&path, [("Černá; Eva", "Černá; Eva", FilterCategory::Vedouci)])
                .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let entries = read_codelist(&path).unwrap();

        assert_eq!(written, 1);
        assert!(text.starts_with("Název;Kód;Kategorie\n"));
        assert_eq!(
            entries[&FilterCategory::Vedouci]["Černá; Eva"].as_deref(),
            Some("Černá; Eva")
        );
    }
}
