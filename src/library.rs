//! A small library of specification functions over byte sequences and paths.
//!
//! Bodies are ordinary expressions; nothing here is special to the engine.
//! Parameter names are distinct across functions that call each other.

use crate::{EvalResult, Expr, Function, Registry, Type};

/// A `seq[byte]` literal holding the bytes of `s`.
pub fn bytes(s: &str) -> Expr {
    Expr::typed_seq(Type::byte(), s.bytes().map(Expr::chr))
}

fn byte_seq() -> Type {
    Type::seq_of(Type::byte())
}

fn var(name: &str) -> Expr {
    Expr::var(name)
}

/// `len(e) - 1`
fn last_index(e: Expr) -> Expr {
    Expr::sub(Expr::len(e), Expr::int(1))
}

/// `bytes.SpecSplit(b, sep)`: split `b` around every `sep`.
pub fn split() -> Function {
    Function::new(
        "bytes.SpecSplit",
        ["b", "sep"],
        Expr::call(
            "bytes.SpecSplitInner",
            [var("b"), var("sep"), Expr::typed_seq(Type::byte(), [])],
        ),
    )
    .returning(Type::seq_of(byte_seq()))
}

/// `bytes.SpecSplitInner(s, sep, ac)` walks `s` one byte at a time, with `ac`
/// holding the segment read so far.
///
/// ```text
/// len(s) == 0 ? seq[seq[byte]]{ac} :
/// sep == s ? seq[seq[byte]]{ac, seq[byte]{}} :
/// len(s) + 1 > len(sep) && s[:len(sep)] == sep ?
///     seq[seq[byte]]{ac} ++ SpecSplitInner(s[len(sep):], sep, seq[byte]{}) :
///     SpecSplitInner(s[1:], sep, ac ++ seq[byte]{s[0]})
/// ```
pub fn split_inner() -> Function {
    let segments = |elems: Vec<Expr>| Expr::typed_seq(byte_seq(), elems);
    let inner = |s: Expr, ac: Expr| Expr::call("bytes.SpecSplitInner", [s, var("sep"), ac]);

    Function::new(
        "bytes.SpecSplitInner",
        ["s", "sep", "ac"],
        Expr::ternop(
            Expr::equals(Expr::len(var("s")), Expr::int(0)),
            segments(vec![var("ac")]),
            Expr::ternop(
                Expr::equals(var("sep"), var("s")),
                segments(vec![var("ac"), Expr::typed_seq(Type::byte(), [])]),
                Expr::ternop(
                    Expr::and(
                        Expr::gt(Expr::add(Expr::len(var("s")), Expr::int(1)), Expr::len(var("sep"))),
                        Expr::equals(
                            Expr::slice(var("s"), None, Some(Expr::len(var("sep")))),
                            var("sep"),
                        ),
                    ),
                    Expr::concat(
                        segments(vec![var("ac")]),
                        inner(
                            Expr::slice(var("s"), Some(Expr::len(var("sep"))), None),
                            Expr::typed_seq(Type::byte(), []),
                        ),
                    ),
                    inner(
                        Expr::slice(var("s"), Some(Expr::int(1)), None),
                        Expr::concat(
                            var("ac"),
                            Expr::typed_seq(Type::byte(), [Expr::index(var("s"), Expr::int(0))]),
                        ),
                    ),
                ),
            ),
        ),
    )
    .returning(Type::seq_of(byte_seq()))
}

/// `bytes.SpecRepeat(r, count)`: `count` copies of `r`, back to back.
pub fn repeat() -> Function {
    Function::new(
        "bytes.SpecRepeat",
        ["r", "count"],
        Expr::ternop(
            Expr::lt(var("count"), Expr::int(1)),
            Expr::typed_seq(Type::byte(), []),
            Expr::concat(
                var("r"),
                Expr::call(
                    "bytes.SpecRepeat",
                    [var("r"), Expr::sub(var("count"), Expr::int(1))],
                ),
            ),
        ),
    )
    .returning(byte_seq())
}

/// `ToPath(path)`: `toPath(bytes.SpecSplit(pathContents(path), "/"), isRooted(path))`
pub fn to_path() -> Function {
    Function::new(
        "ToPath",
        ["path"],
        Expr::call(
            "toPath",
            [
                Expr::call(
                    "bytes.SpecSplit",
                    [Expr::call("pathContents", [var("path")]), bytes("/")],
                ),
                Expr::call("isRooted", [var("path")]),
            ],
        ),
    )
    .returning(Type::named("Path"))
}

/// `pathContents(p)`: `p` without its leading `/`, if it has one.
pub fn path_contents() -> Function {
    Function::new(
        "pathContents",
        ["p"],
        Expr::ternop(
            Expr::call("isRooted", [var("p")]),
            Expr::slice(var("p"), Some(Expr::int(1)), None),
            var("p"),
        ),
    )
    .returning(byte_seq())
}

/// `isRooted(q)`: `len(q) > 0 && q[0] == '/'`
pub fn is_rooted() -> Function {
    Function::new(
        "isRooted",
        ["q"],
        Expr::and(
            Expr::gt(Expr::len(var("q")), Expr::int(0)),
            Expr::equals(Expr::index(var("q"), Expr::int(0)), Expr::chr(b'/')),
        ),
    )
    .returning(Type::bool())
}

/// `newPath(rooted)`: an empty `Path`.
pub fn new_path() -> Function {
    Function::new(
        "newPath",
        ["rooted"],
        Expr::structure(
            "Path",
            [
                ("parts", Expr::typed_seq(Type::named("Segment"), [])),
                ("rooted", var("rooted")),
            ],
        ),
    )
    .returning(Type::named("Path"))
}

/// `toPath(flat, rooted)` appends the segments of `flat` one by one, last
/// segment outermost.
pub fn to_path_inner() -> Function {
    let flat = || var("flat");
    Function::new(
        "toPath",
        ["flat", "rooted"],
        Expr::ternop(
            Expr::equals(Expr::len(flat()), Expr::int(0)),
            Expr::call("newPath", [var("rooted")]),
            Expr::call(
                "pathAppend",
                [
                    Expr::call(
                        "toPath",
                        [Expr::slice(flat(), None, Some(last_index(flat()))), var("rooted")],
                    ),
                    Expr::index(flat(), last_index(flat())),
                ],
            ),
        ),
    )
    .returning(Type::named("Path"))
}

/// `pathAppend(pa, seg)`: `pa` with `seg` added as its last part.
pub fn path_append() -> Function {
    Function::new(
        "pathAppend",
        ["pa", "seg"],
        Expr::structure(
            "Path",
            [
                (
                    "parts",
                    Expr::concat(
                        Expr::field(var("pa"), "parts"),
                        Expr::typed_seq(Type::named("Segment"), [var("seg")]),
                    ),
                ),
                ("rooted", Expr::field(var("pa"), "rooted")),
            ],
        ),
    )
    .returning(Type::named("Path"))
}

/// Every function in this module.
pub fn functions() -> Vec<Function> {
    vec![
        split(),
        split_inner(),
        repeat(),
        to_path(),
        path_contents(),
        is_rooted(),
        new_path(),
        to_path_inner(),
        path_append(),
    ]
}

pub fn registry() -> EvalResult<Registry> {
    Registry::from_functions(functions())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_names_are_distinct() {
        let reg = registry().unwrap();
        assert_eq!(reg.len(), functions().len());
        assert!(reg.get("bytes.SpecSplit").is_some());
        assert_eq!(reg.get("toPath").unwrap().arity(), 2);
    }

    #[test]
    fn bytes_literal() {
        assert_eq!(bytes("a/").to_string(), "seq[byte]{'a', '/'}");
        assert_eq!(bytes("").to_string(), "seq[byte]{}");
    }

    #[test]
    fn declared_return_types_drive_inference() {
        let reg = registry().unwrap();
        let e = Expr::seq([Expr::call("ToPath", [bytes("/a")])]);
        assert_eq!(e.ty(Some(&reg)), Some(Type::seq_of(Type::named("Path"))));
        assert_eq!(e.ty(None), None);
    }
}
