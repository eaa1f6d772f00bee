use std::fs;
use std::path::Path;

/// The 80 COCO classes in the order the stock YOLOv8 weights emit them.
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

/// Class-index to name table for one loaded model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn coco() -> Self {
        Self(COCO_CLASSES.iter().map(|s| s.to_string()).collect())
    }

    /// Parse a labels file: one class name per line, blank lines and `#`
    /// comments skipped.
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        let names: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            anyhow::bail!("Labels file contains no class names");
        }

        Ok(Self(names))
    }

    /// Parse the `names` entry Ultralytics writes into exported model
    /// metadata, a Python dict literal such as `{0: 'person', 1: "driver's seat"}`.
    /// Indices must cover `0..n` exactly.
    pub fn from_model_metadata(raw: &str) -> anyhow::Result<Self> {
        let body = raw
            .trim()
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .ok_or_else(|| anyhow::anyhow!("Class names metadata is not a dict: {}", raw))?;

        let mut entries: Vec<(usize, String)> = Vec::new();
        let mut rest = body.trim_start();

        while !rest.is_empty() {
            let (key, value) = rest
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("Missing ':' in class names metadata"))?;
            let index: usize = key
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Bad class index {:?}: {}", key.trim(), e))?;

            let value = value.trim_start();
            let quote = value
                .chars()
                .next()
                .filter(|c| *c == '\'' || *c == '"')
                .ok_or_else(|| anyhow::anyhow!("Class {} name is not a quoted string", index))?;

            let mut name = String::new();
            let mut end = None;
            let mut chars = value[1..].char_indices();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            name.push(escaped);
                        }
                    }
                    c if c == quote => {
                        end = Some(i);
                        break;
                    }
                    c => name.push(c),
                }
            }
            let end = end.ok_or_else(|| anyhow::anyhow!("Unterminated name for class {}", index))?;

            entries.push((index, name));
            rest = value[end + 2..].trim_start();
            rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        }

        if entries.is_empty() {
            anyhow::bail!("Class names metadata is empty");
        }

        entries.sort_by_key(|(index, _)| *index);
        for (expected, (index, _)) in entries.iter().enumerate() {
            if *index != expected {
                anyhow::bail!("Class names metadata skips or repeats index {}", expected);
            }
        }

        Ok(Self(entries.into_iter().map(|(_, name)| name).collect()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read labels from {}: {}", path.display(), e))?;
        Self::parse(&contents)
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.0.get(class_id).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Allowlist of class names that may appear in a response.
///
/// Built once at startup and never mutated. Matching is exact and
/// case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetClasses(Vec<String>);

impl TargetClasses {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names.into_iter().map(Into::into) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self(unique)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Targets the model can never produce.
    pub fn missing_from<'a>(&'a self, names: &'a ClassNames) -> impl Iterator<Item = &'a str> {
        self.iter().filter(move |target| !names.contains(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_coco_indices_match_yolov8() {
        let names = ClassNames::coco();

        assert_eq!(names.len(), 80);
        assert_eq!(names.get(0), Some("person"));
        assert_eq!(names.get(63), Some("laptop"));
        assert_eq!(names.get(67), Some("cell phone"));
        assert_eq!(names.get(73), Some("book"));
        assert_eq!(names.get(80), None);
    }

    #[test]
    fn test_parse_skips_blanks_and_comments() {
        let names = ClassNames::parse("# custom model\nwidget\n\n  gadget  \n").unwrap();

        assert_eq!(names, ClassNames::new(vec!["widget".into(), "gadget".into()]));
    }

    #[test]
    fn test_model_metadata_dict() {
        let names = ClassNames::from_model_metadata(
            "{0: 'widget', 1: \"driver's seat\", 2: 'a, b: c', 3: 'it\\'s'}",
        )
        .unwrap();

        assert_eq!(names.len(), 4);
        assert_eq!(names.get(0), Some("widget"));
        assert_eq!(names.get(1), Some("driver's seat"));
        assert_eq!(names.get(2), Some("a, b: c"));
        assert_eq!(names.get(3), Some("it's"));
    }

    #[test]
    fn test_model_metadata_out_of_order_keys() {
        let names = ClassNames::from_model_metadata("{1: 'laptop', 0: 'cell phone',}").unwrap();

        assert_eq!(names.get(0), Some("cell phone"));
        assert_eq!(names.get(1), Some("laptop"));
    }

    #[test]
    fn test_model_metadata_rejects_bad_input() {
        for raw in [
            "",
            "['person']",
            "{}",
            "{0: person}",
            "{0: 'person', 2: 'car'}",
            "{x: 'person'}",
            "{0: 'unterminated}",
        ] {
            assert!(ClassNames::from_model_metadata(raw).is_err(), "{:?}", raw);
        }
    }

    #[test]
    fn test_parse_rejects_empty_file() {
        assert!(ClassNames::parse("\n# nothing here\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat\ndog").unwrap();

        let names = ClassNames::from_file(file.path()).unwrap();
        assert_eq!(names.get(1), Some("dog"));

        let err = ClassNames::from_file("/nonexistent/labels.txt").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/labels.txt"));
    }

    #[test]
    fn test_target_classes_exact_match() {
        let targets = TargetClasses::new(["cell phone", "laptop", "laptop"]);

        assert!(targets.contains("laptop"));
        assert!(!targets.contains("Laptop"));
        assert!(!targets.contains("cell"));
        assert_eq!(targets.iter().collect::<Vec<_>>(), vec!["cell phone", "laptop"]);
    }

    #[test]
    fn test_missing_targets() {
        let targets = TargetClasses::new(["laptop", "smartwatch"]);
        let names = ClassNames::coco();

        assert_eq!(targets.missing_from(&names).collect::<Vec<_>>(), vec!["smartwatch"]);
    }
}
