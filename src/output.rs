use clap::ValueEnum;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable report.
    #[default]
    Text,
    /// Pretty-printed JSON on stdout.
    Json,
}
