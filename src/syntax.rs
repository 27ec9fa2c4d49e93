use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Esprima syntactic units mapped to the integers the feature space is built
/// over. The tail entries are the `Literal` sub-types, which substitute for
/// `Literal` in value features.
pub static AST_UNITS: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    [
        ("ArrayExpression", 0),
        ("ArrayPattern", 1),
        ("ArrowFunctionExpression", 2),
        ("AssignmentExpression", 3),
        ("AssignmentPattern", 4),
        ("AwaitExpression", 5),
        ("BinaryExpression", 6),
        ("BlockStatement", 7),
        ("BreakStatement", 8),
        ("CallExpression", 9),
        ("CatchClause", 10),
        ("ClassBody", 11),
        ("ClassDeclaration", 12),
        ("ClassExpression", 13),
        ("ConditionalExpression", 14),
        ("ContinueStatement", 15),
        ("DebuggerStatement", 16),
        ("DoWhileStatement", 17),
        ("EmptyStatement", 18),
        ("ExportAllDeclaration", 19),
        ("ExportDefaultDeclaration", 20),
        ("ExportNamedDeclaration", 21),
        ("ExportSpecifier", 22),
        ("ExpressionStatement", 23),
        ("ForInStatement", 24),
        ("ForOfStatement", 25),
        ("ForStatement", 26),
        ("FunctionDeclaration", 27),
        ("FunctionExpression", 28),
        ("Identifier", 29),
        ("IfStatement", 30),
        ("Import", 31),
        ("ImportDeclaration", 32),
        ("ImportDefaultSpecifier", 33),
        ("ImportNamespaceSpecifier", 34),
        ("ImportSpecifier", 35),
        ("LabeledStatement", 36),
        ("Literal", 37),
        ("LogicalExpression", 38),
        ("MemberExpression", 39),
        ("MetaProperty", 40),
        ("MethodDefinition", 41),
        ("NewExpression", 42),
        ("ObjectExpression", 43),
        ("ObjectPattern", 44),
        ("Program", 45),
        ("Property", 46),
        ("RestElement", 47),
        ("ReturnStatement", 48),
        ("SequenceExpression", 49),
        ("SpreadElement", 50),
        ("Super", 51),
        ("SwitchCase", 52),
        ("SwitchStatement", 53),
        ("TaggedTemplateExpression", 54),
        ("TemplateElement", 55),
        ("TemplateLiteral", 56),
        ("ThisExpression", 57),
        ("ThrowStatement", 58),
        ("TryStatement", 59),
        ("UnaryExpression", 60),
        ("UpdateExpression", 61),
        ("VariableDeclaration", 62),
        ("VariableDeclarator", 63),
        ("WhileStatement", 64),
        ("WithStatement", 65),
        ("YieldExpression", 66),
        ("Line", 67),
        ("Block", 68),
        ("String", 69),
        ("Int", 70),
        ("Numeric", 71),
        ("Bool", 72),
        ("Null", 73),
        ("RegExp", 74),
    ]
    .into_iter()
    .collect()
});

/// Esprima lexical units (token kinds).
pub static TOKENS: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    [
        ("Boolean", 0),
        ("<end>", 1),
        ("Identifier", 2),
        ("Keyword", 3),
        ("Null", 4),
        ("Numeric", 5),
        ("Punctuator", 6),
        ("String", 7),
        ("RegularExpression", 8),
        ("Template", 9),
        ("LineComment", 10),
        ("BlockComment", 11),
    ]
    .into_iter()
    .collect()
});

/// Lowercased JavaScript reserved words and host globals. A use whose name
/// sits in this set never lands in the unknown-variable list.
pub static RESERVED_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // keywords, literals, future reserved
        "abstract", "arguments", "await", "boolean", "break", "byte", "case", "catch", "char",
        "class", "const", "continue", "debugger", "default", "delete", "do", "double", "else",
        "enum", "export", "extends", "false", "final", "finally", "float", "for", "function",
        "goto", "if", "implements", "import", "in", "instanceof", "int", "interface", "let",
        "long", "native", "new", "null", "package", "private", "protected", "public", "return",
        "short", "static", "super", "switch", "synchronized", "this", "throw", "throws",
        "transient", "true", "try", "typeof", "var", "void", "volatile", "while", "with", "yield",
        // built-in objects and properties
        "array", "date", "eval", "hasownproperty", "infinity", "isfinite", "isnan",
        "isprototypeof", "json", "length", "math", "nan", "name", "number", "object", "promise",
        "prototype", "regexp", "string", "symbol", "tostring", "undefined", "valueof",
        // window/document members
        "alert", "all", "anchor", "anchors", "area", "assign", "blur", "button", "checkbox",
        "clearinterval", "cleartimeout", "clientinformation", "close", "closed", "confirm",
        "console", "constructor", "crypto", "decodeuri", "decodeuricomponent", "defaultstatus",
        "document", "element", "elements", "embed", "embeds", "encodeuri", "encodeuricomponent",
        "escape", "event", "fileupload", "focus", "form", "forms", "frame", "frames", "hidden",
        "history", "image", "images", "innerheight", "innerwidth", "layer", "layers", "link",
        "location", "mimetypes", "navigate", "navigator", "offscreenbuffering", "open", "opener",
        "option", "outerheight", "outerwidth", "packages", "pagexoffset", "pageyoffset", "parent",
        "parsefloat", "parseint", "password", "pkcs11", "plugin", "prompt", "propertyisenum",
        "radio", "reset", "screenx", "screeny", "scroll", "secure", "select", "self",
        "setinterval", "settimeout", "status", "submit", "taint", "text", "textarea", "top",
        "unescape", "untaint", "window",
        // inline event handlers
        "onblur", "onclick", "onerror", "onfocus", "onkeydown", "onkeypress", "onkeyup",
        "onload", "onmousedown", "onmouseover", "onmouseup", "onsubmit",
    ]
    .into_iter()
    .collect()
});

pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(name.to_lowercase().as_str())
}
