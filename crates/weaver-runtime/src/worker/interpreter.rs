//! The interpreter loop run by a worker process.

use std::io::{self, BufRead, Write};
use std::panic::{AssertUnwindSafe, catch_unwind};

use boa_engine::{Context, JsError, JsNativeErrorKind, JsString, JsValue, Source, js_string};
use uuid::Uuid;
use weaver_core::InterpreterLimits;

use super::conversion::js_value_to_json;
use super::promise::settle_promise;
use crate::protocol::{ExecutionState, WorkerCommand, WorkerEvent, WorkerMessage};

/// Installed once per interpreter: a buffered `console` and `print`.
const PRELUDE: &str = r#"
var __weaver_stdout__ = [];
var console = {
    log: function () {
        var parts = [];
        for (var index = 0; index < arguments.length; index++) {
            var item = arguments[index];
            parts.push(typeof item === "string" ? item : JSON.stringify(item));
        }
        __weaver_stdout__.push(parts.join(" ") + "\n");
    }
};
console.info = console.log;
console.warn = console.log;
console.error = console.log;
var print = console.log;
function __weaver_drain_stdout__() {
    var text = __weaver_stdout__.join("");
    __weaver_stdout__ = [];
    return text;
}
"#;

/// Error raised by evaluated code, reduced to its class and message.
struct Raised {
    name: String,
    message: String,
}

/// A long-lived Boa context that keeps global state across submissions.
struct Interpreter {
    context: Context,
}

impl Interpreter {
    fn new(limits: &InterpreterLimits) -> Result<Self, String> {
        let mut context = Context::default();
        if let Some(loop_limit) = limits.loop_iteration_limit {
            context
                .runtime_limits_mut()
                .set_loop_iteration_limit(loop_limit);
        }
        context
            .runtime_limits_mut()
            .set_recursion_limit(limits.recursion_limit);

        context
            .eval(Source::from_bytes(PRELUDE))
            .map_err(|err| format!("Failed to install prelude: {err}"))?;

        Ok(Self { context })
    }

    /// Evaluate one submission and emit its events in order:
    /// busy, buffered output, result or error, idle.
    fn execute(&mut self, msg_id: Uuid, code: &str, emit: &mut impl FnMut(WorkerMessage)) {
        emit(WorkerMessage::new(
            msg_id,
            WorkerEvent::Status {
                execution_state: ExecutionState::Busy,
            },
        ));

        let outcome = catch_unwind(AssertUnwindSafe(|| self.evaluate(code))).unwrap_or_else(|_| {
            Err(Raised {
                name: "InternalError".to_owned(),
                message: "interpreter panicked while evaluating submission".to_owned(),
            })
        });

        let printed = self.drain_stdout();
        if !printed.is_empty() {
            emit(WorkerMessage::new(msg_id, WorkerEvent::Stream { text: printed }));
        }

        match outcome {
            Ok(Some(data)) => emit(WorkerMessage::new(
                msg_id,
                WorkerEvent::ExecuteResult { data },
            )),
            Ok(None) => {}
            Err(raised) => emit(WorkerMessage::new(
                msg_id,
                WorkerEvent::Error {
                    ename: raised.name,
                    evalue: raised.message,
                },
            )),
        }

        emit(WorkerMessage::new(
            msg_id,
            WorkerEvent::Status {
                execution_state: ExecutionState::Idle,
            },
        ));
    }

    /// Evaluate `code`; `Ok(None)` when the final value is `undefined`
    fn evaluate(&mut self, code: &str) -> Result<Option<String>, Raised> {
        let value = self
            .context
            .eval(Source::from_bytes(code))
            .map_err(|err| self.describe(&err))?;
        drop(self.context.run_jobs());

        let value = settle_promise(value, &mut self.context).map_err(|err| self.describe(&err))?;
        if value.is_undefined() {
            return Ok(None);
        }

        let json = js_value_to_json(&value, &mut self.context).map_err(|err| self.describe(&err))?;
        serde_json::to_string(&json).map(Some).map_err(|err| Raised {
            name: "SerializationError".to_owned(),
            message: err.to_string(),
        })
    }

    /// Read `name` and `message` off a thrown value
    fn describe(&mut self, error: &JsError) -> Raised {
        if let Some(native) = error.as_native() {
            let name = match native.kind {
                JsNativeErrorKind::Type => "TypeError",
                JsNativeErrorKind::Range => "RangeError",
                JsNativeErrorKind::Reference => "ReferenceError",
                JsNativeErrorKind::Syntax => "SyntaxError",
                JsNativeErrorKind::RuntimeLimit => "RuntimeLimit",
                _ => "Error",
            };
            return Raised {
                name: name.to_owned(),
                message: native.message().to_owned(),
            };
        }

        let thrown = error.to_opaque(&mut self.context);
        let Some(obj) = thrown.as_object() else {
            return Raised {
                name: "Error".to_owned(),
                message: thrown.display().to_string(),
            };
        };

        let mut read = |key: JsString| {
            obj.get(key, &mut self.context)
                .ok()
                .filter(|value: &JsValue| !value.is_undefined())
                .and_then(|value| value.as_string().map(|text| text.to_std_string_escaped()))
        };
        let name = read(js_string!("name")).unwrap_or_else(|| "Error".to_owned());
        let message = read(js_string!("message")).unwrap_or_else(|| error.to_string());

        Raised { name, message }
    }

    fn drain_stdout(&mut self) -> String {
        self.context
            .eval(Source::from_bytes("__weaver_drain_stdout__()"))
            .ok()
            .and_then(|value| value.as_string().map(|text| text.to_std_string_escaped()))
            .unwrap_or_default()
    }
}

fn write_line(output: &mut impl Write, message: &WorkerMessage) -> io::Result<()> {
    writeln!(output, "{}", message.encode())?;
    output.flush()
}

/// Serve one worker: commands in on `input`, events out on `output`.
///
/// Writes the startup handshake first, then evaluates submissions until a
/// shutdown command arrives or `input` reaches end of file. Malformed
/// command lines are skipped.
///
/// # Errors
/// Returns an error if reading a command or writing an event fails
pub fn serve(
    worker_id: &str,
    limits: &InterpreterLimits,
    input: impl BufRead,
    mut output: impl Write,
) -> io::Result<()> {
    let mut interpreter = match Interpreter::new(limits) {
        Ok(interpreter) => interpreter,
        Err(reason) => {
            tracing::warn!(worker_id, "Interpreter failed to start: {reason}");
            return write_line(&mut output, &WorkerMessage::startup_failed(reason));
        }
    };
    write_line(&mut output, &WorkerMessage::ready())?;

    for line in input.lines() {
        let line = line?;
        let command: WorkerCommand = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(err) => {
                tracing::debug!(worker_id, "Ignoring malformed command: {err}");
                continue;
            }
        };
        match command {
            WorkerCommand::Execute { msg_id, code } => {
                tracing::debug!(worker_id, %msg_id, "Evaluating submission");
                let mut written = Ok(());
                interpreter.execute(msg_id, &code, &mut |message| {
                    if written.is_ok() {
                        written = write_line(&mut output, &message);
                    }
                });
                written?;
            }
            WorkerCommand::Shutdown => break,
        }
    }

    tracing::debug!(worker_id, "Worker loop finished");
    Ok(())
}
