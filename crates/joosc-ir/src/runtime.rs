//! Source text for the handful of types every compiled program links
//! against without ever declaring them itself: the `java.lang` types the
//! language assumes exist, and the `__joos_internal__` package backing
//! `instanceof`/casts/string concatenation.
//!
//! The original ships these as real `.java` files on disk plus one
//! string-templated registration class stitched together from the finished
//! [`joosc_types::TypeInfoMap`] (`runtime::GenerateRuntimeFiles`,
//! `GenTypeInfoHolder`) and fed back through the whole compiler a second
//! time. This port's [`crate::ir_generator`] builds each type's `TypeInfo`
//! registration directly into that type's own `TypeInit` stream instead
//! (see `StreamKind::TypeInit`'s doc comment and `DESIGN.md`), so there's no
//! second compilation pass or generated registration class here — just the
//! handful of support types compiled once, same as any other source file.
//!
//! A real build of this compiler would read these from a `runtime/` or
//! `stdlib/` resource directory the way the original reads
//! `runtime/__joos_internal__/TypeInfo.java` off disk; inlining the text
//! here avoids this port needing a resource-loading story of its own.

/// `(virtual filename, source text)` pairs a driver feeds through the
/// lexer/parser/binder exactly like any user compilation unit, before
/// resolving the program the user actually wrote.
pub fn support_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        ("__joos_internal__/TypeInfo.java", TYPE_INFO_SRC),
        ("__joos_internal__/StringOps.java", STRING_OPS_SRC),
        ("__joos_internal__/StackFrame.java", STACK_FRAME_SRC),
        ("java/lang/Object.java", OBJECT_SRC),
        ("java/lang/String.java", STRING_SRC),
    ]
}

/// Backs `instanceof` and reference casts: one instance per declared type,
/// holding its own id and its resolved parent set, plus the static
/// ancestry check every `instanceof`/cast lowers to. `num_types` is read
/// by nothing in this port (no generated registration class needs it) but
/// kept since `lookup_runtime_ids` still resolves it as a well-known id.
const TYPE_INFO_SRC: &str = r#"
package __joos_internal__;

public class TypeInfo {
    public int id;
    public TypeInfo[] parents;
    public static int num_types;

    public TypeInfo(int id, TypeInfo[] parents) {
        this.id = id;
        this.parents = parents;
    }

    public static boolean InstanceOf(TypeInfo obj_type, TypeInfo check_type) {
        if (obj_type.id == check_type.id) {
            return true;
        }
        int i;
        for (i = 0; i < obj_type.parents.length; i = i + 1) {
            if (TypeInfo.InstanceOf(obj_type.parents[i], check_type)) {
                return true;
            }
        }
        return false;
    }
}
"#;

/// Stringifies a non-`String` operand for `+`. Lowering calls this only
/// for reference-typed operands (primitives go through
/// `String.valueOf(...)` instead); a `null` operand stringifies to the
/// literal `"null"`, matching ordinary string concatenation semantics.
const STRING_OPS_SRC: &str = r#"
package __joos_internal__;

public class StringOps {
    public static String Str(Object o) {
        if (o == null) {
            return "null";
        }
        return o.toString();
    }
}
"#;

/// The runtime's exception/abort surface. `Print` is a no-op placeholder
/// for a stack trace dump an instance could emit on its own behalf;
/// `PrintException` is what a failed cast/array-store check calls into
/// before the process would terminate, which this port's opcode set has
/// no dedicated instruction for (see `ir_generator::emit_runtime_check_failure`).
const STACK_FRAME_SRC: &str = r#"
package __joos_internal__;

public class StackFrame {
    public void Print() {}

    public static void PrintException(int code) {}
}
"#;

const OBJECT_SRC: &str = r#"
package java.lang;

public class Object {
    public Object() {}

    public boolean equals(Object other) {
        return this == other;
    }

    public String toString() {
        return "java.lang.Object";
    }

    public int hashCode() {
        return 0;
    }
}
"#;

/// Minimal surface `ir_generator` actually depends on: `concat` for `+`
/// and one `valueOf` overload per primitive for stringifying a numeric
/// operand. Real `String` has far more methods; Joos 1 programs only ever
/// call into this slice of it.
const STRING_SRC: &str = r#"
package java.lang;

public class String {
    public String concat(String other) {
        return this;
    }

    public static String valueOf(boolean b) {
        return "";
    }

    public static String valueOf(byte b) {
        return "";
    }

    public static String valueOf(short s) {
        return "";
    }

    public static String valueOf(char c) {
        return "";
    }

    public static String valueOf(int i) {
        return "";
    }
}
"#;
