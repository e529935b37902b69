//! Best-effort canonical formatting of submitted source.
//!
//! Source is parsed as TypeScript, stripped of type annotations and
//! re-emitted. Anything that fails along the way leaves the text untouched,
//! so the interpreter reports the real problem.

use swc_common::{FileName, GLOBALS, Globals, Mark, SourceMap, sync::Lrc};
use swc_ecma_ast::EsVersion;
use swc_ecma_codegen::{Config as CodegenConfig, Emitter, text_writer::JsWriter};
use swc_ecma_parser::{Syntax, TsSyntax, parse_file_as_program};
use swc_ecma_transforms_base::resolver;
use swc_ecma_transforms_typescript::strip;

/// Parse, strip types and re-emit `source`.
///
/// Returns `None` if the source does not parse cleanly or cannot be emitted.
pub fn canonicalize(source: &str) -> Option<String> {
    let source_map = Lrc::new(SourceMap::default());
    let source_file = source_map.new_source_file(Lrc::new(FileName::Anon), source.to_owned());

    let syntax = Syntax::Typescript(TsSyntax {
        tsx: false,
        decorators: false,
        dts: false,
        no_early_errors: true,
        disallow_ambiguous_jsx_like: false,
    });

    let mut recovered = vec![];
    let program =
        parse_file_as_program(&source_file, syntax, EsVersion::Es2022, None, &mut recovered)
            .ok()?;
    if !recovered.is_empty() {
        return None;
    }

    let program = GLOBALS.set(&Globals::default(), || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();
        let mut pass = (
            resolver(unresolved_mark, top_level_mark, true),
            strip(unresolved_mark, top_level_mark),
        );
        program.apply(&mut pass)
    });

    let mut buf = vec![];
    {
        let writer = JsWriter::new(Lrc::clone(&source_map), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: CodegenConfig::default(),
            cm: Lrc::clone(&source_map),
            comments: None,
            wr: writer,
        };
        emitter.emit_program(&program).ok()?;
    }

    String::from_utf8(buf).ok()
}

/// Canonical form of `source`, or `source` itself if formatting fails
pub fn format_or_original(source: &str) -> String {
    canonicalize(source).unwrap_or_else(|| {
        tracing::warn!("Source could not be formatted; submitting it unchanged");
        source.to_owned()
    })
}
