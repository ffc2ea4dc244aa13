//! Error types.
//!
//! Two specific events are handled as errors so that they propagate upwards
//! naturally, although technically they're not really errors.
//!
//! - [`ErrorKind::Timeout`][timeout], raised when the refinement deadline is
//!   reached, caught at the top of the loop ;
//! - [`ErrorKind::Exit`][exit], used by generation workers to bail out when
//!   the engine sent an exit order.
//!
//! [timeout]: enum.ErrorKind.html#variant.Timeout
//! (Timeout variant of the ErrorKind enum)
//! [exit]: enum.ErrorKind.html#variant.Exit
//! (Exit variant of the ErrorKind enum)

use crate::common::*;

/// Parse error data.
#[derive(Debug)]
pub struct ParseErrorData {
    /// Error message.
    pub msg: String,
    /// Portion of the line *before* the error token.
    pub pref: String,
    /// Token that caused the error.
    pub token: String,
    /// Portion of the line *after* the error token.
    pub suff: String,
    /// Line of the error, relative to the portion of the input accessible by
    /// whoever constructed the error.
    pub line: Option<usize>,
}
impl_fmt! {
    ParseErrorData(self, fmt) {
        let line_str = if let Some(line) = self.line {
            format!("{} ", line)
        } else {
            "".into()
        };
        write!(fmt, "{}", self.msg)?;
        if let Some(line) = self.line {
            writeln!(
                fmt,
                " at [{}]:",
                conf.emph(&format!("{}:{}", line, self.pref.len() + 1))
            )?
        } else {
            writeln!(fmt, ":")?
        }
        writeln!(fmt, "{0: ^1$}|", "", line_str.len())?;
        writeln!(
            fmt,
            "{}| {}{}{}",
            &line_str,
            conf.emph(&self.pref),
            conf.bad(&self.token),
            conf.emph(&self.suff)
        )?;
        writeln!(
            fmt,
            "{0: ^1$}| {0: ^2$}{3}",
            "",
            line_str.len(),
            self.pref.len(),
            conf.bad(&format!("{0:^>1$}", "", self.token.len()))
        )
    }
}

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Res;
    }

    foreign_links {
        Io(::std::io::Error) #[doc = "IO error."];
    }

    errors {
        #[doc = "Parse error, for grammar files and seed inputs."]
        ParseError(data: ParseErrorData) {
            description("parse error")
            display("{}", data)
        }
        #[doc = "A constraint could not be evaluated on some tree."]
        Eval(msg: String) {
            description("evaluation error")
            display("evaluation error: {}", msg)
        }
        #[doc = "Seed set has no failing or no passing input."]
        BadSeeds {
            description("ill-posed seed set")
            display(
                "the initial inputs must contain \
                at least one failing and one passing input"
            )
        }
        #[doc = "Template shape the instantiator does not handle."]
        Unsupported(msg: String) {
            description("unsupported template")
            display("unsupported template: {}", msg)
        }
        #[doc = "Not really an error, exit early return."]
        Exit {
            description("exit")
            display("exit")
        }
        #[doc = "Timeout reached."]
        Timeout {
            description("timeout")
            display("timeout")
        }
    }
}

impl Error {
    /// True if the kind of the error is [`ErrorKind::Eval`][eval].
    ///
    /// [eval]: enum.ErrorKind.html#variant.Eval
    /// (ErrorKind's Eval variant)
    pub fn is_eval(&self) -> bool {
        matches!(*self.kind(), ErrorKind::Eval(_))
    }

    /// True if the kind of the error is [`ErrorKind::Timeout`][timeout].
    ///
    /// [timeout]: enum.ErrorKind.html#variant.Timeout
    /// (ErrorKind's Timeout variant)
    pub fn is_timeout(&self) -> bool {
        matches!(*self.kind(), ErrorKind::Timeout)
    }

    /// True if the kind of the error is [`ErrorKind::Exit`][exit].
    ///
    /// [exit]: enum.ErrorKind.html#variant.Exit
    /// (ErrorKind's Exit variant)
    pub fn is_exit(&self) -> bool {
        matches!(*self.kind(), ErrorKind::Exit)
    }
}

/// Convenience constructor for evaluation errors.
pub fn eval_err<S: Into<String>>(msg: S) -> Error {
    ErrorKind::Eval(msg.into()).into()
}

/// Prints an error.
pub fn print_err(errs: &Error) {
    println!("({} \"", conf.bad("error"));
    for err in errs.iter() {
        for line in format!("{}", err).lines() {
            println!("  {}", line)
        }
    }
    println!("\")")
}
