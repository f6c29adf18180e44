use joosc_ast::{parse_file, MemberDecl, TypeKind};
use joosc_common::span::FileId;

const SOURCE: &str = r#"
package shapes;

import java.lang.Object;

public class Rectangle extends Object implements Shape {
    protected int width;
    protected int height;

    public Rectangle(int width, int height) {
        this.width = width;
        this.height = height;
    }

    public int area() {
        return width * height;
    }

    public boolean isSquare() {
        if (width == height) {
            return true;
        } else {
            return false;
        }
    }
}
"#;

#[test]
fn parses_a_realistic_class() {
    let (cu, errors) = parse_file(FileId(0), SOURCE);
    assert!(errors.is_empty(), "{:?}", errors.iter().map(|e| &e.message).collect::<Vec<_>>());
    let cu = cu.expect("expected a compilation unit");

    assert_eq!(cu.package.as_ref().unwrap().joined(), "shapes");
    assert_eq!(cu.imports.len(), 1);
    assert_eq!(cu.imports[0].name.joined(), "java.lang.Object");

    assert_eq!(cu.types.len(), 1);
    let ty = &cu.types[0];
    assert_eq!(&*ty.name, "Rectangle");
    assert_eq!(ty.kind, TypeKind::Class);
    assert_eq!(ty.extends.len(), 1);
    assert_eq!(ty.extends[0].joined(), "Object");
    assert_eq!(ty.implements.len(), 1);
    assert_eq!(ty.implements[0].joined(), "Shape");

    assert_eq!(ty.members.len(), 5);
    let method_names: Vec<&str> = ty
        .members
        .iter()
        .filter_map(|m| match m {
            MemberDecl::Method(m) => Some(&*m.name),
            _ => None,
        })
        .collect();
    assert!(method_names.contains(&"area"));
    assert!(method_names.contains(&"isSquare"));
}

#[test]
fn parser_recovers_none_on_garbage_input() {
    let (cu, errors) = parse_file(FileId(0), "this is not java {{{");
    assert!(cu.is_none());
    assert!(!errors.is_empty());
}
