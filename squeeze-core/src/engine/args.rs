//! Engine command builder utilities
//!
//! This module provides a builder for engine invocations (one input, one
//! output) and for the filter chains the compressors pass with `-vf`.
//! Thread arguments are not part of a command; [`super::EngineHandle::exec`]
//! adds the ones matching the loaded build.

/// Builder for a single-input, single-output engine invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineCommand {
    input_opts: Vec<String>,
    input: String,
    output_opts: Vec<String>,
    output: String,
}

impl EngineCommand {
    /// Creates a command reading `input` and writing `output` (scratch names).
    #[must_use]
    pub fn new(input: &str, output: &str) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            ..Self::default()
        }
    }

    /// Adds an option placed before `-i`.
    #[must_use]
    pub fn input_opt(mut self, key: &str, value: impl ToString) -> Self {
        self.input_opts.push(key.to_string());
        self.input_opts.push(value.to_string());
        self
    }

    /// Adds an option (flag plus value) placed after the input.
    #[must_use]
    pub fn opt(mut self, key: &str, value: impl ToString) -> Self {
        self.output_opts.push(key.to_string());
        self.output_opts.push(value.to_string());
        self
    }

    /// Adds a bare flag placed after the input (e.g. `-an`).
    #[must_use]
    pub fn flag(mut self, flag: &str) -> Self {
        self.output_opts.push(flag.to_string());
        self
    }

    /// Caps the output file size (`-fs`).
    #[must_use]
    pub fn max_output_bytes(self, bytes: u64) -> Self {
        self.opt("-fs", bytes)
    }

    #[must_use]
    pub fn input_name(&self) -> &str {
        &self.input
    }

    #[must_use]
    pub fn output_name(&self) -> &str {
        &self.output
    }

    /// Value following the last occurrence of `key` in the output options.
    #[must_use]
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.output_opts
            .windows(2)
            .rev()
            .find(|w| w[0] == key)
            .map(|w| w[1].as_str())
    }

    /// Whether a bare flag or option key is present after the input.
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.output_opts.iter().any(|a| a == key)
    }

    /// Removes every `key value` pair with exactly this key and value.
    #[must_use]
    pub fn without_pair(mut self, key: &str, value: &str) -> Self {
        let mut kept = Vec::with_capacity(self.output_opts.len());
        let mut i = 0;
        while i < self.output_opts.len() {
            if self.output_opts[i] == key
                && self.output_opts.get(i + 1).is_some_and(|v| v == value)
            {
                i += 2;
                continue;
            }
            kept.push(self.output_opts[i].clone());
            i += 1;
        }
        self.output_opts = kept;
        self
    }

    /// Renders the full argument list.
    #[must_use]
    pub fn to_args(&self, thread_args: &[String]) -> Vec<String> {
        let mut args = Vec::with_capacity(
            self.input_opts.len() + self.output_opts.len() + thread_args.len() + 5,
        );
        args.push("-y".to_string());
        args.extend(self.input_opts.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.clone());
        args.extend(self.output_opts.iter().cloned());
        args.extend(thread_args.iter().cloned());
        args.push(self.output.clone());
        args
    }
}

/// Builder for constructing video filter chains
#[derive(Debug, Default)]
pub struct FilterChain {
    filters: Vec<String>,
}

impl FilterChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scales to `width`, height following the aspect ratio (even).
    #[must_use]
    pub fn scale_width(mut self, width: u32) -> Self {
        self.filters.push(format!("scale={width}:-2"));
        self
    }

    /// Scales to `width` with a named scaler.
    #[must_use]
    pub fn scale_width_with(mut self, width: u32, flags: &str) -> Self {
        self.filters.push(format!("scale={width}:-2:flags={flags}"));
        self
    }

    /// Caps the long edge at `side`, never upscaling.
    #[must_use]
    pub fn cap_long_edge(mut self, side: u32) -> Self {
        self.filters.push(format!(
            "scale='if(gt(iw,ih),min({side},iw),-2)':'if(lte(iw,ih),min({side},ih),-2)':force_original_aspect_ratio=decrease"
        ));
        self
    }

    #[must_use]
    pub fn fps(mut self, fps: u32) -> Self {
        self.filters.push(format!("fps={fps}"));
        self
    }

    /// Builds the filter chain into a single filter string
    #[must_use]
    pub fn build(self) -> String {
        self.filters.join(",")
    }
}

/// Parses a kbps value such as `"120k"` as used with `-b:v`.
#[must_use]
pub fn parse_kbps(value: &str) -> Option<u32> {
    value.trim().strip_suffix('k')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_layout() {
        let cmd = EngineCommand::new("job_in.mp4", "job_out.webm")
            .input_opt("-ss", 5)
            .opt("-c:v", "libvpx")
            .flag("-an")
            .max_output_bytes(1024);
        let args = cmd.to_args(&["-threads".to_string(), "1".to_string()]);
        assert_eq!(
            args,
            vec![
                "-y", "-ss", "5", "-i", "job_in.mp4", "-c:v", "libvpx", "-an", "-fs", "1024",
                "-threads", "1", "job_out.webm"
            ]
        );
        assert_eq!(cmd.value_of("-fs"), Some("1024"));
        assert!(cmd.has("-an"));
    }

    #[test]
    fn test_without_pair() {
        let cmd = EngineCommand::new("in", "out")
            .opt("-map", "0:v:0")
            .opt("-map", "0:a:0?")
            .without_pair("-map", "0:a:0?");
        assert_eq!(cmd.to_args(&[]), vec!["-y", "-i", "in", "-map", "0:v:0", "out"]);
    }

    #[test]
    fn test_filter_chain() {
        let chain = FilterChain::new().scale_width(320).fps(12).build();
        assert_eq!(chain, "scale=320:-2,fps=12");
        assert!(FilterChain::new().cap_long_edge(1600).build().contains("min(1600,iw)"));
    }

    #[test]
    fn test_parse_kbps() {
        assert_eq!(parse_kbps("120k"), Some(120));
        assert_eq!(parse_kbps("120"), None);
    }
}
