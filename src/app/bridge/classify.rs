/// The bridge shell gives no message framing, so noise suppression is the
/// only way extractors ever see clean data. Classification is a pure
/// deny-list predicate over single lines.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass {
    Noise,
    Significant,
}

/// Substrings that mark a line as protocol noise: echoed bridge commands,
/// shell banners, the devices header, daemon chatter and the exit command.
const DENY_MARKERS: &[&str] = &[
    "adb ",
    "List of devices attached",
    "* daemon",
    "Microsoft Windows",
    "Corporation. All rights reserved",
    "exit",
];

#[derive(Debug, Clone)]
pub struct LineClassifier {
    markers: Vec<String>,
}

impl LineClassifier {
    /// The working directory is part of the deny-list because the shell
    /// echoes it as a prompt before every command.
    pub fn new(working_dir: &str) -> Self {
        let mut markers: Vec<String> = DENY_MARKERS.iter().map(|m| m.to_string()).collect();
        let dir = working_dir.trim();
        if !dir.is_empty() {
            markers.push(dir.to_string());
        }
        Self { markers }
    }

    pub fn classify(&self, line: &str) -> LineClass {
        if line.trim().is_empty() {
            return LineClass::Noise;
        }
        if self.markers.iter().any(|marker| line.contains(marker)) {
            return LineClass::Noise;
        }
        LineClass::Significant
    }

    pub fn is_significant(&self, line: &str) -> bool {
        self.classify(line) == LineClass::Significant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> LineClassifier {
        LineClassifier::new("/opt/platform-tools")
    }

    #[test]
    fn blank_lines_are_noise() {
        assert_eq!(classifier().classify(""), LineClass::Noise);
        assert_eq!(classifier().classify("   \t"), LineClass::Noise);
    }

    #[test]
    fn exit_marker_is_always_noise() {
        let classifier = classifier();
        assert_eq!(classifier.classify("exit"), LineClass::Noise);
        // Regardless of surrounding content.
        assert_eq!(
            classifier.classify("ABC123\tdevice exit trailing"),
            LineClass::Noise
        );
    }

    #[test]
    fn echoed_commands_and_headers_are_noise() {
        let classifier = classifier();
        assert_eq!(classifier.classify("adb devices"), LineClass::Noise);
        assert_eq!(
            classifier.classify("List of devices attached"),
            LineClass::Noise
        );
        assert_eq!(
            classifier.classify("* daemon started successfully"),
            LineClass::Noise
        );
    }

    #[test]
    fn working_dir_echo_is_noise() {
        assert_eq!(
            classifier().classify("/opt/platform-tools $"),
            LineClass::Noise
        );
    }

    #[test]
    fn unmarked_nonblank_lines_are_significant() {
        let classifier = classifier();
        assert_eq!(classifier.classify("ABC123\tdevice"), LineClass::Significant);
        assert_eq!(
            classifier.classify("XYZ:5555\tunauthorized"),
            LineClass::Significant
        );
        assert_eq!(
            classifier.classify("12 files pushed, 3 skipped."),
            LineClass::Significant
        );
    }
}
