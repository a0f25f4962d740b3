/// X-ray absorption spectroscopy datatypes
///
/// Athena project files (gzip-compressed Perl data dumps written by Demeter)
/// and FEFF scattering-calculation input files.

use super::{
    file_peek_or_message,
    sniff::{get_headers, DEFAULT_HEADER_COUNT},
    Datatype, DatasetInstance, FilePrefix, MetadataElement, MetadataError,
};

const ATHENA_MAGIC: &str = "# Athena project file";
const PYMATGEN_FEFF_MARKER: &str = "* This FEFF.inp file generated by pymatgen";

const ATHENA_ELEMENTS: &[MetadataElement] = &[
    MetadataElement { name: "atsym", desc: "Atom symbol", readonly: true, visible: true },
    MetadataElement { name: "bkg_e0", desc: "Edge energy (eV)", readonly: true, visible: true },
    MetadataElement { name: "edge", desc: "Edge", readonly: true, visible: true },
    MetadataElement { name: "npts", desc: "Number of points", readonly: true, visible: true },
    MetadataElement { name: "xmax", desc: "Maximum energy (eV)", readonly: true, visible: true },
    MetadataElement { name: "xmin", desc: "Minimum energy (eV)", readonly: true, visible: true },
];

const FEFF_ELEMENTS: &[MetadataElement] = &[MetadataElement {
    name: "title_block",
    desc: "Title block",
    readonly: true,
    visible: true,
}];

/// Drop `front` leading and `back` trailing characters; too-short input
/// yields an empty string
fn trim_chars(value: &str, front: usize, back: usize) -> &str {
    let total = value.chars().count();
    if total <= front + back {
        return "";
    }
    let start = value.char_indices().nth(front).map(|(i, _)| i).unwrap_or(0);
    let end = value
        .char_indices()
        .nth(total - back)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    &value[start..end]
}

/// Athena project format
#[derive(Debug, Default, Clone, Copy)]
pub struct AthenaProject;

impl Datatype for AthenaProject {
    fn file_ext(&self) -> &'static str {
        "prj"
    }

    fn compressed_format(&self) -> Option<&'static str> {
        Some("gzip")
    }

    fn metadata_elements(&self) -> &'static [MetadataElement] {
        ATHENA_ELEMENTS
    }

    fn sniff_prefix(&self, prefix: &FilePrefix) -> bool {
        prefix.starts_with(ATHENA_MAGIC)
    }

    /// Extract metadata from the `@args` record of the first group
    fn set_meta(&self, dataset: &mut DatasetInstance) -> Result<(), MetadataError> {
        let headers = get_headers(&dataset.file_name, Some(" = "), 3, Some("#"))?;

        let args_record = headers
            .iter()
            .find(|header| header.len() > 1 && header[0] == "@args")
            .map(|header| header[1].as_str())
            .ok_or_else(|| MetadataError::MissingHeader("@args".to_string()))?;

        // ('name','value',...);  ->  'name','value',...
        let args: Vec<&str> = trim_chars(args_record, 1, 2).split(',').collect();

        for element in ATHENA_ELEMENTS {
            let quoted_key = format!("'{}'", element.name);
            let value = args
                .iter()
                .position(|arg| *arg == quoted_key)
                .and_then(|index| args.get(index + 1))
                .ok_or_else(|| MetadataError::MissingKey(element.name.to_string()))?;
            dataset
                .metadata
                .insert(element.name.to_string(), trim_chars(value, 1, 1).to_string());
        }

        Ok(())
    }

    fn set_peek(&self, dataset: &mut DatasetInstance) {
        if dataset.purged {
            dataset.mark_purged_peek();
            return;
        }

        dataset.peek = Some(file_peek_or_message(&dataset.file_name));
        dataset.info = Some(format!(
            "atsym: {}\nbkg_e0: {}\nedge: {}\nnpts: {}\nxmax: {}\nxmin: {}",
            dataset.meta("atsym"),
            dataset.meta("bkg_e0"),
            dataset.meta("edge"),
            dataset.meta("npts"),
            dataset.meta("xmax"),
            dataset.meta("xmin"),
        ));
        dataset.blurb = Some(format!(
            "Athena project file of {} {} edge",
            dataset.meta("atsym"),
            dataset.meta("edge")
        ));
    }
}

/// FEFF input format
#[derive(Debug, Default, Clone, Copy)]
pub struct FeffInput;

impl FeffInput {
    /// `* potential-index Z ...` or `* ipot Z ...`
    fn is_potentials_header(line: &str) -> bool {
        let Some(rest) = line.strip_prefix('*') else {
            return false;
        };
        let words: Vec<&str> = rest.split_whitespace().collect();
        words.len() >= 2 && matches!(words[0], "potential-index" | "ipot") && words[1] == "Z"
    }

    /// `* x y z ipot ...`
    fn is_atoms_header(line: &str) -> bool {
        let Some(rest) = line.strip_prefix('*') else {
            return false;
        };
        let words: Vec<&str> = rest.split_whitespace().take(4).collect();
        words == ["x", "y", "z", "ipot"]
    }
}

impl Datatype for FeffInput {
    fn file_ext(&self) -> &'static str {
        "inp"
    }

    fn metadata_elements(&self) -> &'static [MetadataElement] {
        FEFF_ELEMENTS
    }

    /// The first POTENTIALS or ATOMS card decides; its column legend must follow
    fn sniff_prefix(&self, prefix: &FilePrefix) -> bool {
        // pymatgen marks generated inputs, but files may come from elsewhere
        if prefix.starts_with(PYMATGEN_FEFF_MARKER) {
            return true;
        }

        let mut lines = prefix.line_iterator().map(str::trim);
        while let Some(line) = lines.next() {
            match line {
                "POTENTIALS" => return lines.next().is_some_and(Self::is_potentials_header),
                "ATOMS" => return lines.next().is_some_and(Self::is_atoms_header),
                _ => {}
            }
        }

        false
    }

    /// Collect every TITLE card into the title block
    fn set_meta(&self, dataset: &mut DatasetInstance) -> Result<(), MetadataError> {
        let headers = get_headers(&dataset.file_name, None, DEFAULT_HEADER_COUNT, Some("*"))?;

        let mut title_block = String::new();
        for header in headers.iter().filter(|h| h.first().is_some_and(|w| w == "TITLE")) {
            title_block.push_str(&header[1..].join(" "));
            title_block.push('\n');
        }

        dataset.metadata.insert("title_block".to_string(), title_block);
        Ok(())
    }

    fn set_peek(&self, dataset: &mut DatasetInstance) {
        if dataset.purged {
            dataset.mark_purged_peek();
            return;
        }

        dataset.peek = Some(file_peek_or_message(&dataset.file_name));
        dataset.info = Some(dataset.meta("title_block").to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    const ATHENA_PROJECT: &str = "\
# Athena project file -- Demeter version 0.9.26
# This file created at 2019-01-01T10:00:00
# Using Demeter 0.9.26 with perl 5.026001 and using Larch 0.9.40 on linux
$old_group = 'fe_foil';
@args = ('name','Fe foil','atsym','Fe','bkg_e0','7112.0','edge','K','npts','412','xmax','7800.0','xmin','6912.0');
@x = ('6912.0','6913.0');
";

    const PYMATGEN_INPUT: &str = "\
* This FEFF.inp file generated by pymatgen
TITLE comment: None given
TITLE Source:  CoO19128.cif
TITLE Structure Summary:  Co2 O2
";

    const ATOMS_INPUT: &str = "\
TITLE Si bulk
TITLE generated by larch

ATOMS
*   x          y          z      ipot  tag
    0.00000    0.00000    0.00000  0   Si
";

    const POTENTIALS_INPUT: &str = "\
TITLE Cu metal
POTENTIALS
*   ipot   Z  element
      0   29   Cu
";

    const BAD_ATOMS: &str = "\
ATOMS
    0.00000    0.00000    0.00000  0   Si
";

    const BAD_POTENTIALS: &str = "\
POTENTIALS
*   ipot   element   Z
";

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn gzip(content: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn athena_sniffs_compressed_project() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "test.prj", &gzip(ATHENA_PROJECT));
        assert!(AthenaProject.sniff(&path).unwrap());
    }

    #[test]
    fn athena_rejects_cif() {
        let prefix = FilePrefix::from_bytes(b"data_Si\n_cell_length_a 5.43\n");
        assert!(!AthenaProject.sniff_prefix(&prefix));
    }

    #[test]
    fn athena_metadata_from_args_record() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "test.prj", &gzip(ATHENA_PROJECT));
        let mut dataset = DatasetInstance::new(path);

        AthenaProject.set_meta(&mut dataset).unwrap();
        assert_eq!(dataset.meta("atsym"), "Fe");
        assert_eq!(dataset.meta("bkg_e0"), "7112.0");
        assert_eq!(dataset.meta("edge"), "K");
        assert_eq!(dataset.meta("npts"), "412");
        assert_eq!(dataset.meta("xmax"), "7800.0");
        assert_eq!(dataset.meta("xmin"), "6912.0");

        AthenaProject.set_peek(&mut dataset);
        assert_eq!(dataset.blurb.as_deref(), Some("Athena project file of Fe K edge"));
        assert!(dataset.info.as_deref().unwrap().starts_with("atsym: Fe\nbkg_e0: 7112.0"));
        assert!(dataset.peek.as_deref().unwrap().starts_with(ATHENA_MAGIC));
    }

    #[test]
    fn athena_metadata_requires_args_record() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "empty.prj", &gzip("# Athena project file\n$old_group = 'x';\n"));
        let mut dataset = DatasetInstance::new(path);

        let err = AthenaProject.set_meta(&mut dataset).unwrap_err();
        assert!(matches!(err, MetadataError::MissingHeader(_)));
    }

    #[test]
    fn athena_metadata_reports_missing_key() {
        let dir = tempdir().unwrap();
        let content = "# Athena project file\n@args = ('name','x','atsym','Cu');\n";
        let path = write(&dir, "partial.prj", &gzip(content));
        let mut dataset = DatasetInstance::new(path);

        match AthenaProject.set_meta(&mut dataset).unwrap_err() {
            MetadataError::MissingKey(key) => assert_eq!(key, "bkg_e0"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn purged_dataset_peek() {
        let mut dataset = DatasetInstance::new("/nonexistent.prj");
        dataset.purged = true;
        AthenaProject.set_peek(&mut dataset);
        assert_eq!(dataset.peek.as_deref(), Some("file does not exist"));
        assert_eq!(dataset.blurb.as_deref(), Some("file purged from disk"));
    }

    #[test]
    fn feff_sniffs_known_inputs() {
        for content in [PYMATGEN_INPUT, ATOMS_INPUT, POTENTIALS_INPUT] {
            let prefix = FilePrefix::from_bytes(content.as_bytes());
            assert!(FeffInput.sniff_prefix(&prefix), "should sniff: {content}");
        }
    }

    #[test]
    fn feff_rejects_bad_inputs() {
        let cif = "data_Si\n_symmetry_space_group_name_H-M 'F d -3 m'\n";
        for content in [BAD_ATOMS, BAD_POTENTIALS, cif, "ATOMS\n", "POTENTIALS\n\n"] {
            let prefix = FilePrefix::from_bytes(content.as_bytes());
            assert!(!FeffInput.sniff_prefix(&prefix), "should not sniff: {content:?}");
        }
    }

    #[test]
    fn feff_title_block_collects_title_cards() {
        let dir = tempdir().unwrap();
        let path = write(&dir, "feff.inp", PYMATGEN_INPUT.as_bytes());
        let mut dataset = DatasetInstance::new(path);

        FeffInput.set_meta(&mut dataset).unwrap();
        assert_eq!(
            dataset.meta("title_block"),
            "comment: None given\nSource: CoO19128.cif\nStructure Summary: Co2 O2\n"
        );

        FeffInput.set_peek(&mut dataset);
        assert_eq!(dataset.info.as_deref(), Some(dataset.meta("title_block")));
    }

    #[test]
    fn trim_chars_handles_short_values() {
        assert_eq!(trim_chars("('a','b');", 1, 2), "'a','b'");
        assert_eq!(trim_chars("'Fe'", 1, 1), "Fe");
        assert_eq!(trim_chars("x", 1, 1), "");
    }
}
