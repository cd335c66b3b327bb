use std::fmt;
use std::str::FromStr;

use crate::error::{ExportError, Result};

/// Output format the service stages files in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Fits,
    Jpeg,
    Mp4,
    Mpeg,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [Self::Fits, Self::Jpeg, Self::Mp4, Self::Mpeg];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fits => "FITS",
            Self::Jpeg => "JPEG",
            Self::Mp4 => "MP4",
            Self::Mpeg => "MPEG",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                ExportError::Argument(format!(
                    "protocol {s} not understood, must be one of FITS, JPEG, MP4, MPEG"
                ))
            })
    }
}

/// How staged files are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Url,
    Ftp,
    UrlTar,
    FtpTar,
}

impl Method {
    pub const ALL: [Method; 4] = [Self::Url, Self::Ftp, Self::UrlTar, Self::FtpTar];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Ftp => "ftp",
            Self::UrlTar => "url-tar",
            Self::FtpTar => "ftp-tar",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                ExportError::Argument(format!(
                    "method {s} not understood, must be one of url, ftp, url-tar, ftp-tar"
                ))
            })
    }
}

/// An export request, validated at construction.
///
/// The series string must carry a record-set filter (`hmi.ic_720s[$]`,
/// `hmi.M_45s[2024.01.01_00:00/1h]`); the text before the bracket names the
/// series and seeds the generated filename format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    series: String,
    email: String,
    requestor: Option<String>,
    protocol: Protocol,
    method: Method,
}

impl ExportRequest {
    pub fn new(
        series: impl Into<String>,
        email: impl Into<String>,
        protocol: Protocol,
        method: Method,
    ) -> Result<Self> {
        let series = series.into().trim().to_string();
        let email = email.into().trim().to_string();

        if !series.contains('[') {
            return Err(ExportError::Argument(format!(
                "failed to parse series {series}: missing record-set filter"
            )));
        }
        if series.starts_with('[') {
            return Err(ExportError::Argument(format!(
                "failed to parse series {series}: missing series name"
            )));
        }
        if email.is_empty() {
            return Err(ExportError::Argument(
                "a registered email address is required to submit the query".into(),
            ));
        }
        if !email.contains('@') {
            return Err(ExportError::Argument(format!(
                "{email} does not look like an email address"
            )));
        }

        Ok(Self {
            series,
            email,
            requestor: None,
            protocol,
            method,
        })
    }

    pub fn with_requestor(mut self, requestor: impl Into<String>) -> Self {
        let requestor = requestor.into();
        self.requestor = if requestor.trim().is_empty() {
            None
        } else {
            Some(requestor.trim().to_string())
        };
        self
    }

    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Series name without the record-set filter.
    pub fn series_prefix(&self) -> &str {
        self.series
            .split_once('[')
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.series)
    }

    pub fn filename_format(&self) -> String {
        format!("{}.{{T_REC:A}}.{{CAMERA}}.{{segment}}", self.series_prefix())
    }

    /// Query parameters of the `exp_request` call, in wire order.
    pub(crate) fn submit_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("op", "exp_request".to_string()),
            ("ds", self.series.clone()),
            ("sizeratio", "1".to_string()),
            ("process", "n=0|no_op".to_string()),
            ("requestor", self.requestor.clone().unwrap_or_default()),
            ("notify", self.email.clone()),
            ("method", self.method.to_string()),
            ("filenamefmt", self.filename_format()),
            ("format", "json".to_string()),
            ("protocol", format!("{},compress Rice", self.protocol)),
        ]
    }
}
