use chrono::NaiveDateTime;

/// Basic Error types.
#[derive(Debug)]
pub enum WinError {
    /// IoError from the std library.
    StdIoError(std::io::Error),
    /// A value does not fit where it must: a declared bit width, a BCD
    /// nibble, a calendar field or the two-digit year range.
    OutOfRange { msg: String },
    /// The requested sample-size code cannot represent the data.
    InsufficientWidth { size: u8, value: i64 },
    /// A sample-size code outside of 0..=5.
    UnexpectedSampleSize { code: u8 },
    /// A second-frame whose length field disagrees with its contents, or a
    /// file that ends in the middle of a frame.
    MalformedFrame { msg: String },
    /// An attempt to insert a channel id that is already in the set.
    DuplicateChannel { ch: u16 },
    /// A trim window that does not overlap the data.
    EmptyRange { msg: String },
    /// A target time was given without the seconds before/after it.
    MissingTimeArgs { missing: &'static str },
    /// The start of a requested time range is not before its end.
    TimeRangeEmpty {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    /// The sampling interval is not constant where it has to be.
    NonUniformRate,
    /// A bad argument to a processing operation.
    Process { msg: String },
    /// A field of a fixed-column ASCII file failed to parse.
    ParseField { field: &'static str, text: String },
    /// Refusal to overwrite an existing file.
    FileExists { path: std::path::PathBuf },
    /// The operation was cancelled through its cancel token.
    Cancelled,
}

impl From<std::io::Error> for WinError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl std::fmt::Display for WinError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use self::WinError::*;
        match self {
            StdIoError(x) => write!(fmt, "{}", x),
            OutOfRange { msg } => write!(fmt, "Value out of range: {}", msg),
            InsufficientWidth { size, value } => write!(
                fmt,
                "Sample size code {} cannot represent the value {}",
                size, value
            ),
            UnexpectedSampleSize { code } => {
                write!(fmt, "Unexpected sample size code: {} (must be 0..=5)", code)
            }
            MalformedFrame { msg } => write!(fmt, "Malformed second-frame: {}", msg),
            DuplicateChannel { ch } => {
                write!(fmt, "Channel {:04X} is already in the set", ch)
            }
            EmptyRange { msg } => write!(fmt, "Trim window produced no samples: {}", msg),
            MissingTimeArgs { missing } => write!(
                fmt,
                "A target time was given, but {} is missing",
                missing
            ),
            TimeRangeEmpty { start, end } => write!(
                fmt,
                "Start time is not before end time: start {}, end {}",
                start, end
            ),
            NonUniformRate => write!(fmt, "Sampling interval is not constant"),
            Process { msg } => write!(fmt, "Processing error: {}", msg),
            ParseField { field, text } => {
                write!(fmt, "Could not parse field '{}' from {:?}", field, text)
            }
            FileExists { path } => write!(fmt, "File already exists: {}", path.display()),
            Cancelled => write!(fmt, "Operation cancelled"),
        }
    }
}

impl From<WinError> for String {
    fn from(e: WinError) -> String {
        e.to_string()
    }
}

impl std::error::Error for WinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WinError::StdIoError(x) => x.source(),
            _ => None,
        }
    }
}
