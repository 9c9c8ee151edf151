// Copyright 2015-2021 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::protocol::OpCodeParseErr;
use std::any::Any;
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// The error type produced by every fallible operation in this crate. The
/// cause, where one exists, can be recovered with [`Error::downcast_ref`].
#[derive(Debug)]
pub struct Error {
    inner: Inner,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.inner)
    }
}

impl StdError for Error {}

impl Error {
    pub(crate) fn with_cause<E>(kind: ErrorKind, source: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Inner {
                kind,
                source: Some(source.into()),
            },
        }
    }

    pub fn downcast_ref<T: Any + StdError>(&self) -> Option<&T> {
        match &self.inner.source {
            Some(source) => source.downcast_ref(),
            None => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn is_io(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Io)
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Protocol)
    }

    pub fn is_encoding(&self) -> bool {
        matches!(self.inner.kind, ErrorKind::Encoding)
    }
}

#[derive(Debug)]
struct Inner {
    kind: ErrorKind,
    source: Option<BoxError>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Protocol,
    Encoding,
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::with_cause(ErrorKind::Io, e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::with_cause(ErrorKind::Protocol, e)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(e: FromUtf8Error) -> Self {
        Error::with_cause(ErrorKind::Encoding, e)
    }
}

/// Everything that can go wrong between the first upgrade byte and the last
/// frame. One connection's protocol error never outlives that connection.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Unexpected end of stream")]
    UnexpectedEof,
    #[error("Malformed HTTP request")]
    Malformed,
    #[error("Missing Host header")]
    MissingHost,
    #[error("Request is not a WebSocket upgrade")]
    NotAnUpgrade,
    #[error("Unsupported WebSocket version: `{0}`")]
    UnsupportedVersion(String),
    #[error("Unsupported protocol variant")]
    UnsupportedVariant,
    #[error("Malformed Sec-WebSocket-Key")]
    MalformedKey,
    #[error("Bad OpCode: `{0}`")]
    OpCode(#[from] OpCodeParseErr),
    #[error("Received an unexpected unmasked frame")]
    UnmaskedFrame,
    #[error("Received a fragmented control frame")]
    FragmentedControl,
    #[error("A frame exceeded the maximum permitted size")]
    PayloadTooLarge,
    #[error("Authentication refused")]
    AuthRefused,
}
