//! Hand-framed HTTP/1.1 transport: request assembly, parsing and response emission

pub mod assembler;
pub mod request;
pub mod response;

pub use assembler::{find_header_end, Assembly, AssembleError, RequestAssembler};
pub use request::{ParseError, RawRequest};
pub use response::{wants_keep_alive, ConnectionDirective, HttpResponse};

/// Header terminator separating the header block from the body
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
