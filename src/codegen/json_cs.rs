//! JSON marshalling for C# on top of `System.Xml.Linq`.
//!
//! The runtime's `PIDL.JSONTools` maps JSON onto `XElement` trees. The
//! envelope is the one the C++ backend speaks, so a C# client can talk to
//! a C++ server and the other way round.

use super::context::Role;
use super::cs::{dotted, CsCodeGen, CsEmitter, CsMarshalling};
use super::helper::CodeGenHelper;
use super::logging::LoggingStyle;
use super::{identifier, string_literal, MARSHALLING_VERSION};
use crate::ast::{Definition, DefinitionProvider, Direction, Document, FunctionVariant, Property, Structure, Type, TypeRef};
use crate::error::CodegenError;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCs;

impl CsCodeGen<JsonCs> {
    /// C# generator with JSON marshalling.
    pub fn json_cs(helper: Box<dyn CodeGenHelper>) -> Self {
        CsCodeGen::new(helper, JsonCs)
    }
}

const USINGS: &[&str] = &[
    "System",
    "System.Collections.Generic",
    "System.Linq",
    "System.Text",
    "System.Xml.Linq",
];

const INVOKE_SIGNATURE: &str =
    "_InvokeStatus _invoke(XElement root, out XElement ret, PIDL.IPIDLErrorCollector ec)";

const INVOKE_STATUS: &str =
    "public enum _InvokeStatus { Ok, NotImplemented, Error, MarshallingError, FatalError, NotSupportedMarshallingVersion };";

const FUNCTION_TYPE: &str = "Func<XElement, PIDL.IPIDLErrorCollector, _FunctionRet>";

const INVOKE_CALL: &[(usize, &str)] = &[
    (0, "var status = _intf._invoke(root, out ret, ec);"),
    (0, "switch (status)"),
    (0, "{"),
    (0, "case _InvokeStatus.Ok:"),
    (1, "break;"),
    (0, "case _InvokeStatus.NotImplemented:"),
    (1, r#"ec.Add((int)status, "function is not implemented");"#),
    (1, "return false;"),
    (0, "case _InvokeStatus.Error:"),
    (1, r#"ec.Add((int)status, "error while executing server function");"#),
    (1, "return false;"),
    (0, "case _InvokeStatus.FatalError:"),
    (1, r#"ec.Add((int)status, "fatal error while executing server function");"#),
    (1, "return false;"),
    (0, "case _InvokeStatus.MarshallingError:"),
    (1, r#"ec.Add((int)status, "error while marshalling of function call");"#),
    (1, "return false;"),
    (0, "case _InvokeStatus.NotSupportedMarshallingVersion:"),
    (1, r#"ec.Add((int)status, "not supported marshalling version");"#),
    (1, "return false;"),
    (0, "}"),
    (0, "return true;"),
];

const LOOKUP: &[(usize, &str)] = &[
    (0, "bool _getValue(XElement r, string name, PIDL.JSONTools.Type type, out XElement ret, PIDL.IPIDLErrorCollector ec)"),
    (0, "{"),
    (1, "if (!PIDL.JSONTools.getValue(r, name, type, out ret))"),
    (1, r#"{ ec.Add(-1, "value '" + name + "' is not found or invalid"); return false; }"#),
    (1, "return true;"),
    (0, "}"),
    (0, ""),
];

const GENERIC_GET_VALUE: &[(usize, &str)] = &[
    (0, "bool _getValue<T>(XElement v, out Nullable<T> ret, PIDL.IPIDLErrorCollector ec)"),
    (1, "where T : struct"),
    (0, "{"),
    (1, "if (PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Null))"),
    (1, "{ ret = null; return true; }"),
    (1, "T _ret;"),
    (1, "if (!_getValue(v, out _ret, ec))"),
    (1, "{ ret = null; return false; }"),
    (1, "ret = _ret; return true;"),
    (0, "}"),
    (0, ""),
    (0, "bool _getValue<T>(XElement r, string name, out Nullable<T> ret, PIDL.IPIDLErrorCollector ec)"),
    (1, "where T : struct"),
    (0, "{"),
    (1, "XElement v;"),
    (1, "if (!PIDL.JSONTools.getValue(r, name, out v))"),
    (1, r#"{ ec.Add(-1, "value '" + name + "' is not found"); ret = null; return false; }"#),
    (1, "return _getValue(v, out ret, ec);"),
    (0, "}"),
    (0, ""),
    (0, "bool _getValue<T>(XElement v, out T[] ret, PIDL.IPIDLErrorCollector ec)"),
    (0, "{"),
    (1, "if (PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Null))"),
    (1, "{ ret = null; return true; }"),
    (1, "if (typeof(T) == typeof(byte))"),
    (1, "{"),
    (2, "string tmp;"),
    (2, "if (!_getValue(v, out tmp, ec))"),
    (2, "{ ret = null; return false; }"),
    (2, "ret = (T[])(object)Convert.FromBase64String(tmp);"),
    (2, "return true;"),
    (1, "}"),
    (1, "if (!PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Array))"),
    (1, r#"{ ec.Add(-1, "value is not array"); ret = null; return false; }"#),
    (1, "var elems = v.Elements(\"item\").ToArray();"),
    (1, "ret = new T[elems.Length];"),
    (1, "bool isOk = true;"),
    (1, "for (int i = 0; i < elems.Length; ++i)"),
    (2, "if (!_getValue(elems[i], out ret[i], ec)) isOk = false;"),
    (1, "return isOk;"),
    (0, "}"),
    (0, ""),
    (0, "bool _getValue<T>(XElement r, string name, out T[] ret, PIDL.IPIDLErrorCollector ec)"),
    (0, "{"),
    (1, "XElement v;"),
    (1, "if (!PIDL.JSONTools.getValue(r, name, out v))"),
    (1, r#"{ ec.Add(-1, "value '" + name + "' is not found"); ret = null; return false; }"#),
    (1, "return _getValue(v, out ret, ec);"),
    (0, "}"),
    (0, ""),
];

const GENERIC_ADD_VALUE: &[(usize, &str)] = &[
    (0, "void _addValue<T>(XElement r, string name, Nullable<T> val)"),
    (1, "where T : struct"),
    (0, "{"),
    (1, "if (val == null)"),
    (2, "PIDL.JSONTools.addValue(r, name, PIDL.JSONTools.Type.Null);"),
    (1, "else"),
    (2, "_addValue(r, name, val.Value);"),
    (0, "}"),
    (0, ""),
    (0, "void _addValue<T>(XElement r, string name, T[] val)"),
    (0, "{"),
    (1, "if (val == null)"),
    (1, "{ PIDL.JSONTools.addValue(r, name, PIDL.JSONTools.Type.Null); return; }"),
    (1, "if (typeof(T) == typeof(byte))"),
    (1, "{ _addValue(r, name, Convert.ToBase64String((byte[])(object)val)); return; }"),
    (1, "var v = PIDL.JSONTools.addValue(r, name, PIDL.JSONTools.Type.Array);"),
    (1, "foreach (var it in val)"),
    (2, "_addValue(v, \"item\", it);"),
    (0, "}"),
];

const CALL_GUARDED: &[(usize, &str)] = &[
    (0, "_InvokeStatus _callFunction(Func<object> func, PIDL.IPIDLErrorCollector ec)"),
    (0, "{"),
    (1, "try"),
    (1, "{"),
    (2, "func();"),
    (1, "}"),
    (1, "catch (PIDL.PIDLException e)"),
    (1, "{"),
    (2, "e.Get(ec);"),
];

fn write_lines(e: &mut CsEmitter<'_>, level: usize, lines: &[(usize, &str)]) {
    for (indent, text) in lines {
        if text.is_empty() {
            e.w.blank();
        } else {
            e.w.line(level + indent, text);
        }
    }
}

fn log_line(e: &mut CsEmitter<'_>, level: usize, fragment: String) {
    if !fragment.is_empty() {
        e.w.line(level, format!("{fragment};"));
    }
}

/// A type with its own `_getValue_{key}`/`_createValue_{key}` trio.
enum Marshalled<'a> {
    Structure {
        ty: String,
        key: String,
        label: String,
        structure: &'a Structure,
    },
    Object {
        ty: String,
        key: String,
    },
    Tuple {
        ty: String,
        key: String,
        components: &'a [TypeRef],
    },
}

impl Marshalled<'_> {
    fn ty(&self) -> &str {
        match self {
            Marshalled::Structure { ty, .. } | Marshalled::Object { ty, .. } | Marshalled::Tuple { ty, .. } => ty,
        }
    }

    fn key(&self) -> &str {
        match self {
            Marshalled::Structure { key, .. } | Marshalled::Object { key, .. } | Marshalled::Tuple { key, .. } => key,
        }
    }
}

fn collect_named<'a>(document: &'a Document, definitions: &'a [Definition], out: &mut Vec<Marshalled<'a>>) {
    for definition in definitions {
        match definition {
            Definition::TypeDefinition(td) => {
                if let Type::Structure(structure) = &*td.ty {
                    let ty = dotted(&td.scope, &td.name);
                    out.push(Marshalled::Structure {
                        key: identifier(&ty),
                        ty,
                        label: td.name.clone(),
                        structure,
                    });
                }
            }
            Definition::Object(handle) => {
                let ty = dotted(&handle.scope, &handle.name);
                out.push(Marshalled::Object {
                    key: identifier(&ty),
                    ty,
                });
                collect_named(document, &document.object(handle).definitions, out);
            }
            _ => {}
        }
    }
}

impl JsonCs {
    fn logging<'a>(e: &CsEmitter<'a>) -> &'a dyn LoggingStyle {
        e.helper().logging()
    }

    fn write_invoke_call(&self, e: &mut CsEmitter<'_>, level: usize, provider: DefinitionProvider<'_>) {
        e.w.line(
            level,
            "bool _invokeCall(XElement root, out XElement ret, PIDL.IPIDLErrorCollector ec)",
        );
        e.w.line(level, "{");
        if !provider.is_object() {
            e.w.line(level + 1, "var _intf = this;");
        }
        write_lines(e, level + 1, INVOKE_CALL);
        e.w.line(level, "}");
        e.w.blank();
    }

    fn write_dispatch_members(&self, e: &mut CsEmitter<'_>, level: usize) {
        let logging = Self::logging(e);
        let l = level + 1;
        if logging.is_enabled() {
            e.w.line(level, format!("{} _logger;", logging.logger_type()));
        }
        e.w.line(level, "struct _FunctionRet { public _InvokeStatus status; public XElement ret; };");
        e.w.line(
            level,
            format!(
                "Dictionary<string, Dictionary<string, {FUNCTION_TYPE}>> _functions = new Dictionary<string, Dictionary<string, {FUNCTION_TYPE}>>();"
            ),
        );
        e.w.blank();

        e.w.line(level, format!("void _register(string name, string variant, {FUNCTION_TYPE} func)"));
        e.w.line(level, "{");
        e.w.line(l, "if (!_functions.ContainsKey(name))");
        e.w.line(l + 1, format!("_functions[name] = new Dictionary<string, {FUNCTION_TYPE}>();"));
        e.w.line(l, "_functions[name][variant] = func;");
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(
            level,
            "_InvokeStatus _callFunction(string name, string variant, XElement root, out XElement ret, PIDL.IPIDLErrorCollector ec)",
        );
        e.w.line(level, "{");
        e.w.line(l, "ret = null;");
        e.w.line(l, "if (!_functions.ContainsKey(name))");
        e.w.line(l, "{");
        log_line(e, l + 1, logging.warning("_logger", "\"function '\" + name + \"' is not found\""));
        e.w.line(l + 1, "ec.Add(-1, \"function '\" + name + \"' is not found\");");
        e.w.line(l + 1, "return _InvokeStatus.NotImplemented;");
        e.w.line(l, "}");
        e.w.line(l, "var vars = _functions[name];");
        e.w.line(l, "_FunctionRet retval;");
        e.w.line(l, "if (string.IsNullOrEmpty(variant) && vars.Count == 1)");
        e.w.line(l + 1, "retval = vars.Values.First()(root, ec);");
        e.w.line(l, "else if (vars.ContainsKey(variant))");
        e.w.line(l + 1, "retval = vars[variant](root, ec);");
        e.w.line(l, "else");
        e.w.line(l, "{");
        log_line(
            e,
            l + 1,
            logging.warning("_logger", "\"variant '\" + variant + \"' of function '\" + name + \"' is not found\""),
        );
        e.w.line(
            l + 1,
            "ec.Add(-1, \"variant '\" + variant + \"' of function '\" + name + \"' is not found\");",
        );
        e.w.line(l + 1, "return _InvokeStatus.NotImplemented;");
        e.w.line(l, "}");
        e.w.line(l, "ret = retval.ret;");
        e.w.line(l, "return retval.status;");
        e.w.line(level, "}");
        e.w.blank();

        write_lines(e, level, CALL_GUARDED);
        log_line(e, l + 1, logging.error("_logger", "\"server function failed\""));
        e.w.line(l + 1, "return _InvokeStatus.Error;");
        e.w.line(l, "}");
        e.w.line(l, "catch (Exception e)");
        e.w.line(l, "{");
        e.w.line(l + 1, "ec.Add((int)_InvokeStatus.FatalError, \"unhandled exception: '\" + e.ToString() + \"'\");");
        log_line(e, l + 1, logging.fatal("_logger", "\"unhandled exception: \" + e.ToString()"));
        e.w.line(l + 1, "return _InvokeStatus.FatalError;");
        e.w.line(l, "}");
        e.w.line(l, "return _InvokeStatus.Ok;");
        e.w.line(level, "}");
        e.w.blank();
    }

    fn write_structure_marshallers(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        ty: &str,
        key: &str,
        label: &str,
        structure: &Structure,
    ) {
        let l = level + 1;
        e.w.line(
            level,
            format!("{ty} _getValue_{key}(XElement v, out bool isOk, PIDL.IPIDLErrorCollector ec)"),
        );
        e.w.line(level, "{");
        e.w.line(l, format!("var ret = new {ty}();"));
        e.w.line(l, "if (!PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Object))");
        e.w.line(l, "{");
        e.w.line(l + 1, format!("ec.Add(-1, \"value of '{label}' is not object\");"));
        e.w.line(l + 1, "isOk = false; return ret;");
        e.w.line(l, "}");
        if structure.members.is_empty() {
            e.w.line(l, "isOk = true;");
        } else {
            e.w.line(l, "isOk =");
            for (i, member) in structure.members.iter().enumerate() {
                let lead = if i == 0 { "  " } else { "& " };
                e.w.line(l + 1, format!("{lead}_getValue(v, \"{0}\", out ret.{0}, ec)", member.name));
            }
            e.w.line(l + 1, ";");
        }
        e.w.line(l, "return ret;");
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(
            level,
            format!("{ty} _getValue_{key}(XElement r, string name, out bool isOk, PIDL.IPIDLErrorCollector ec)"),
        );
        e.w.line(level, "{");
        e.w.line(l, "XElement v;");
        e.w.line(l, "if (!_getValue(r, name, PIDL.JSONTools.Type.Object, out v, ec))");
        e.w.line(l, format!("{{ isOk = false; return new {ty}(); }}"));
        e.w.line(l, format!("return _getValue_{key}(v, out isOk, ec);"));
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(level, format!("void _createValue_{key}(XElement r, string name, {ty} val)"));
        e.w.line(level, "{");
        e.w.line(l, "var v = PIDL.JSONTools.addValue(r, name, PIDL.JSONTools.Type.Object);");
        for member in &structure.members {
            e.w.line(l, format!("_addValue(v, \"{0}\", val.{0});", member.name));
        }
        e.w.line(level, "}");
        e.w.blank();
    }

    /// Named lookup for reference types, where JSON null maps to C# null.
    fn write_nullable_lookup(e: &mut CsEmitter<'_>, level: usize, ty: &str, key: &str) {
        let l = level + 1;
        e.w.line(
            level,
            format!("{ty} _getValue_{key}(XElement r, string name, out bool isOk, PIDL.IPIDLErrorCollector ec)"),
        );
        e.w.line(level, "{");
        e.w.line(l, "XElement v;");
        e.w.line(l, "if (!PIDL.JSONTools.getValue(r, name, out v))");
        e.w.line(
            l,
            "{ ec.Add(-1, \"value '\" + name + \"' is not found\"); isOk = false; return null; }",
        );
        e.w.line(l, "if (PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Null))");
        e.w.line(l, "{ isOk = true; return null; }");
        e.w.line(l, format!("return _getValue_{key}(v, out isOk, ec);"));
        e.w.line(level, "}");
        e.w.blank();
    }

    fn write_object_marshallers(&self, e: &mut CsEmitter<'_>, level: usize, ty: &str, key: &str) {
        let l = level + 1;
        e.w.line(
            level,
            format!("{ty} _getValue_{key}(XElement v, out bool isOk, PIDL.IPIDLErrorCollector ec)"),
        );
        e.w.line(level, "{");
        e.w.line(l, "string object_data;");
        e.w.line(l, "if (!_getValue(v, out object_data, ec))");
        e.w.line(l, "{ isOk = false; return null; }");
        match e.role() {
            Role::Client => {
                e.w.line(l, "isOk = true;");
                e.w.line(l, format!("return new {ty}(this, object_data);"));
            }
            Role::Server => {
                e.w.line(l, "var o = _get_object(object_data, ec);");
                e.w.line(l, "if (o == null)");
                e.w.line(l, "{ isOk = false; return null; }");
                e.w.line(l, format!("if (!(o is {ty}))"));
                e.w.line(
                    l,
                    "{ ec.Add(-1, \"unexpected: invalid object type for id '\" + object_data + \"'\"); isOk = false; return null; }",
                );
                e.w.line(l, format!("isOk = true; return o as {ty};"));
            }
        }
        e.w.line(level, "}");
        e.w.blank();

        Self::write_nullable_lookup(e, level, ty, key);

        e.w.line(level, format!("void _createValue_{key}(XElement r, string name, {ty} val)"));
        e.w.line(level, "{");
        e.w.line(l, "if (val == null)");
        e.w.line(l + 1, "PIDL.JSONTools.addValue(r, name, PIDL.JSONTools.Type.Null);");
        e.w.line(l, "else");
        e.w.line(l + 1, "PIDL.JSONTools.addValue(r, name, val._id);");
        e.w.line(level, "}");
        e.w.blank();
    }

    /// Tuples travel as JSON arrays, `ItemN` at position `N - 1`.
    fn write_tuple_marshallers(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        ty: &str,
        key: &str,
        components: &[TypeRef],
    ) -> Result<(), CodegenError> {
        let l = level + 1;
        let size = components.len();
        e.w.line(
            level,
            format!("{ty} _getValue_{key}(XElement v, out bool isOk, PIDL.IPIDLErrorCollector ec)"),
        );
        e.w.line(level, "{");
        e.w.line(l, "var items = v.Elements(\"item\").ToArray();");
        e.w.line(
            l,
            format!("if (!PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Array) || items.Length != {size})"),
        );
        e.w.line(
            l,
            format!("{{ ec.Add(-1, \"value is not a tuple of {size} elements\"); isOk = false; return null; }}"),
        );
        let mut names = Vec::with_capacity(size);
        for (i, component) in components.iter().enumerate() {
            let component = e.type_name(component)?;
            e.w.line(l, format!("{component} item{i};"));
            names.push(format!("item{i}"));
        }
        e.w.line(l, "isOk =");
        for i in 0..size {
            let lead = if i == 0 { "  " } else { "& " };
            e.w.line(l + 1, format!("{lead}_getValue(items[{i}], out item{i}, ec)"));
        }
        e.w.line(l + 1, ";");
        e.w.line(l, format!("return isOk ? new {ty}({}) : null;", names.join(", ")));
        e.w.line(level, "}");
        e.w.blank();

        Self::write_nullable_lookup(e, level, ty, key);

        e.w.line(level, format!("void _createValue_{key}(XElement r, string name, {ty} val)"));
        e.w.line(level, "{");
        e.w.line(l, "if (val == null)");
        e.w.line(l, "{ PIDL.JSONTools.addValue(r, name, PIDL.JSONTools.Type.Null); return; }");
        e.w.line(l, "var v = PIDL.JSONTools.addValue(r, name, PIDL.JSONTools.Type.Array);");
        for i in 1..=size {
            e.w.line(l, format!("_addValue(v, \"item\", val.Item{i});"));
        }
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }

    /// `_getValue<T>`/`_addValue<T>` route the generated types through
    /// `typeof` checks and hand everything else to the runtime.
    fn write_dispatchers(&self, e: &mut CsEmitter<'_>, level: usize, items: &[Marshalled<'_>]) {
        let l = level + 1;
        e.w.line(
            level,
            "bool _getValue<T>(XElement r, string name, out T ret, PIDL.IPIDLErrorCollector ec)",
        );
        e.w.line(level, "{");
        e.w.line(l, "bool isOk = false;");
        for (i, item) in items.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "else if" };
            e.w.line(l, format!("{keyword} (typeof(T) == typeof({}))", item.ty()));
            e.w.line(
                l + 1,
                format!("ret = (T)(object)_getValue_{}(r, name, out isOk, ec);", item.key()),
            );
        }
        if items.is_empty() {
            e.w.line(l, "isOk = PIDL.JSONTools.getValue(r, name, out ret);");
        } else {
            e.w.line(l, "else");
            e.w.line(l + 1, "isOk = PIDL.JSONTools.getValue(r, name, out ret);");
        }
        e.w.line(l, "if (!isOk)");
        e.w.line(l + 1, "ec.Add(-1, \"value '\" + name + \"' is not found or invalid\");");
        e.w.line(l, "return isOk;");
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(level, "bool _getValue<T>(XElement v, out T ret, PIDL.IPIDLErrorCollector ec)");
        e.w.line(level, "{");
        for item in items {
            e.w.line(l, format!("if (typeof(T) == typeof({}))", item.ty()));
            e.w.line(l, "{");
            e.w.line(l + 1, "bool isOk;");
            e.w.line(l + 1, format!("ret = (T)(object)_getValue_{}(v, out isOk, ec);", item.key()));
            e.w.line(l + 1, "return isOk;");
            e.w.line(l, "}");
        }
        e.w.line(l, "if (!PIDL.JSONTools.getValue<T>(v, out ret))");
        e.w.line(l, "{ ec.Add(-1, \"value is invalid\"); return false; }");
        e.w.line(l, "return true;");
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(level, "void _addValue<T>(XElement r, string name, T val)");
        e.w.line(level, "{");
        for (i, item) in items.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "else if" };
            e.w.line(l, format!("{keyword} (typeof(T) == typeof({}))", item.ty()));
            e.w.line(
                l + 1,
                format!("_createValue_{}(r, name, ({})(object)val);", item.key(), item.ty()),
            );
        }
        if items.is_empty() {
            e.w.line(l, "PIDL.JSONTools.addValue<T>(r, name, val);");
        } else {
            e.w.line(l, "else");
            e.w.line(l + 1, "PIDL.JSONTools.addValue<T>(r, name, val);");
        }
        e.w.line(level, "}");
        e.w.blank();
    }

    fn write_marshallers(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        e.w.line(level, "#region marshallers");
        write_lines(e, level, LOOKUP);

        let prebuilt: Vec<_> = e.prebuilt().iter().cloned().collect();
        let mut items = Vec::new();
        collect_named(e.document(), provider.definitions(), &mut items);
        for entry in &prebuilt {
            let key = entry.index.to_string();
            match &*entry.ty {
                Type::Structure(structure) => items.push(Marshalled::Structure {
                    ty: e.prebuilt_name(entry.index),
                    key,
                    label: format!("_Prebuilt{}", entry.index),
                    structure,
                }),
                Type::Tuple(components) => items.push(Marshalled::Tuple {
                    ty: e.type_name(&entry.ty)?,
                    key,
                    components,
                }),
                _ => {}
            }
        }

        for item in &items {
            match item {
                Marshalled::Structure {
                    ty,
                    key,
                    label,
                    structure,
                } => self.write_structure_marshallers(e, level, ty, key, label, structure),
                Marshalled::Object { ty, key } => self.write_object_marshallers(e, level, ty, key),
                Marshalled::Tuple { ty, key, components } => {
                    self.write_tuple_marshallers(e, level, ty, key, components)?;
                }
            }
        }

        self.write_dispatchers(e, level, &items);
        write_lines(e, level, GENERIC_GET_VALUE);
        write_lines(e, level, GENERIC_ADD_VALUE);
        e.w.line(level, "#endregion marshallers");
        e.w.blank();
        Ok(())
    }

    fn write_function_closure(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        is_object: bool,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError> {
        let logging = Self::logging(e);
        let l = level + 1;
        e.w.line(
            level,
            format!(
                "_register(\"{}\", \"{}\", (root, ec) =>",
                variant.name,
                variant.variant_id()
            ),
        );
        e.w.line(level, "{");
        if !is_object {
            e.w.line(l, "var _intf = this;");
        }
        log_line(e, l, logging.trace("_logger", &string_literal(&variant.name)));
        e.w.line(l, "var ret = new _FunctionRet();");
        for argument in &variant.arguments {
            let ty = e.type_name(&argument.ty)?;
            e.w.line(l, format!("{ty} _arg_{} = default({ty});", argument.name));
        }

        let inputs: Vec<_> = variant.in_arguments().collect();
        if !inputs.is_empty() {
            e.w.line(l, "XElement aa;");
            e.w.line(
                l,
                "if (!_intf._getValue(root, \"arguments\", PIDL.JSONTools.Type.Object, out aa, ec))",
            );
            e.w.line(l, "{ ret.status = _InvokeStatus.MarshallingError; return ret; }");
            e.w.line(l, "if (");
            for (i, argument) in inputs.iter().enumerate() {
                let lead = if i == 0 { "" } else { "| " };
                e.w.line(
                    l + 1,
                    format!("{lead}!_intf._getValue(aa, \"{0}\", out _arg_{0}, ec)", argument.name),
                );
            }
            e.w.line(l, ")");
            e.w.line(l, "{ ret.status = _InvokeStatus.MarshallingError; return ret; }");
        }

        let returns = !variant.return_type.is_void();
        if returns {
            let ty = e.type_name(&variant.return_type)?;
            e.w.line(l, format!("{ty} retval = default({ty});"));
        }
        let arguments: Vec<String> = variant
            .arguments
            .iter()
            .map(|a| match a.direction {
                Direction::In => format!("_arg_{}", a.name),
                Direction::InOut => format!("ref _arg_{}", a.name),
                Direction::Out => format!("out _arg_{}", a.name),
            })
            .collect();
        e.w.line(
            l,
            format!(
                "ret.status = _callFunction(() => {{ {}{}({}); return null; }}, ec);",
                if returns { "retval = " } else { "" },
                variant.name,
                arguments.join(", ")
            ),
        );
        e.w.line(l, "if (ret.status != _InvokeStatus.Ok)");
        e.w.line(l + 1, "return ret;");
        e.w.line(l, "ret.ret = PIDL.JSONTools.createValue(\"root\", PIDL.JSONTools.Type.Object);");
        if returns {
            e.w.line(l, "_intf._addValue(ret.ret, \"retval\", retval);");
        }
        let outputs: Vec<_> = variant.out_arguments().collect();
        if !outputs.is_empty() {
            e.w.line(
                l,
                "var out_v = PIDL.JSONTools.addValue(ret.ret, \"output\", PIDL.JSONTools.Type.Object);",
            );
            for argument in outputs {
                e.w.line(l, format!("_intf._addValue(out_v, \"{0}\", _arg_{0});", argument.name));
            }
        }
        e.w.line(l, "return ret;");
        e.w.line(level, "});");
        e.w.blank();
        Ok(())
    }

    fn write_property_closures(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        let logging = Self::logging(e);
        let ty = e.type_name(&property.ty)?;
        let l = level + 1;

        e.w.line(level, format!("_register(\"{}\", \"get\", (root, ec) =>", property.name));
        e.w.line(level, "{");
        log_line(e, l, logging.trace("_logger", &string_literal(&format!("get_{}", property.name))));
        e.w.line(l, "var ret = new _FunctionRet();");
        e.w.line(l, format!("{ty} retval = default({ty});"));
        e.w.line(
            l,
            format!(
                "ret.status = _callFunction(() => {{ retval = {}; return null; }}, ec);",
                property.name
            ),
        );
        e.w.line(l, "if (ret.status != _InvokeStatus.Ok)");
        e.w.line(l + 1, "return ret;");
        e.w.line(l, "ret.ret = PIDL.JSONTools.createValue(\"root\", PIDL.JSONTools.Type.Object);");
        e.w.line(l, "_intf._addValue(ret.ret, \"retval\", retval);");
        e.w.line(l, "return ret;");
        e.w.line(level, "});");
        e.w.blank();

        if !property.readonly {
            e.w.line(level, format!("_register(\"{}\", \"set\", (root, ec) =>", property.name));
            e.w.line(level, "{");
            log_line(e, l, logging.trace("_logger", &string_literal(&format!("set_{}", property.name))));
            e.w.line(l, "var ret = new _FunctionRet();");
            e.w.line(l, format!("{ty} value = default({ty});"));
            e.w.line(l, "if (!_intf._getValue(root, \"value\", out value, ec))");
            e.w.line(l, "{ ret.status = _InvokeStatus.MarshallingError; return ret; }");
            e.w.line(
                l,
                format!(
                    "ret.status = _callFunction(() => {{ {} = value; return null; }}, ec);",
                    property.name
                ),
            );
            e.w.line(l, "return ret;");
            e.w.line(level, "});");
            e.w.blank();
        }
        Ok(())
    }

    fn write_dispose_closure(&self, e: &mut CsEmitter<'_>, level: usize) {
        let l = level + 1;
        e.w.line(level, "_register(\"_dispose_object\", \"\", (root, ec) =>");
        e.w.line(level, "{");
        e.w.line(l, "var ret = new _FunctionRet();");
        e.w.line(l, "string _arg_object_data;");
        e.w.line(l, "XElement aa;");
        e.w.line(l, "if (!_getValue(root, \"arguments\", PIDL.JSONTools.Type.Object, out aa, ec))");
        e.w.line(l, "{ ret.status = _InvokeStatus.MarshallingError; return ret; }");
        e.w.line(l, "if (!_getValue(aa, \"object_data\", out _arg_object_data, ec))");
        e.w.line(l, "{ ret.status = _InvokeStatus.MarshallingError; return ret; }");
        e.w.line(
            l,
            "ret.status = _callFunction(() => { _dispose_object(_arg_object_data); return null; }, ec);",
        );
        e.w.line(l, "return ret;");
        e.w.line(level, "});");
    }

    /// Creates `_root` with the version stamp; `_intf` must be in scope.
    fn write_envelope_start(e: &mut CsEmitter<'_>, level: usize) {
        e.w.line(level, "var _ec = new PIDL.PIDLExceptionErrorCollector();");
        e.w.line(level, "var _root = PIDL.JSONTools.createValue(\"root\", PIDL.JSONTools.Type.Object);");
        e.w.line(level, format!("_intf._addValue(_root, \"version\", {MARSHALLING_VERSION});"));
    }

    fn write_object_call(e: &mut CsEmitter<'_>, level: usize, key: &str) {
        e.w.line(level, "var _r = PIDL.JSONTools.addValue(_root, \"object_call\", PIDL.JSONTools.Type.Object);");
        e.w.line(level, "_intf._addValue(_r, \"object_data\", _id);");
        e.w.line(
            level,
            format!("var _v = PIDL.JSONTools.addValue(_r, \"{key}\", PIDL.JSONTools.Type.Object);"),
        );
    }

    fn write_send(e: &mut CsEmitter<'_>, level: usize) {
        e.w.line(level, "XElement _ret;");
        e.w.line(level, "if (!_invokeCall(_root, out _ret, _ec))");
        e.w.line(level + 1, "_ec.ThrowException();");
    }
}

impl CsMarshalling for JsonCs {
    fn write_usings(&self, e: &mut CsEmitter<'_>) -> Result<(), CodegenError> {
        for using in USINGS {
            e.w.line(0, format!("using {using};"));
        }
        Ok(())
    }

    fn write_members(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        match e.role() {
            Role::Server => self.write_dispatch_members(e, level),
            Role::Client => self.write_invoke_call(e, level, provider),
        }
        if provider.is_object() {
            return Ok(());
        }
        self.write_marshallers(e, level, provider)?;

        match e.role() {
            Role::Server => {
                e.w.line(
                    level,
                    "protected abstract _IObject _get_object(string object_data, PIDL.IPIDLErrorCollector ec);",
                );
                e.w.line(level, "protected abstract void _dispose_object(string object_data);");
                e.w.blank();
            }
            Role::Client => {
                let l = level + 1;
                e.w.line(level, "public void _dispose_object(string object_data)");
                e.w.line(level, "{");
                e.w.line(l, "var _intf = this;");
                Self::write_envelope_start(e, l);
                e.w.line(l, "var _v = PIDL.JSONTools.addValue(_root, \"function\", PIDL.JSONTools.Type.Object);");
                e.w.line(l, "_intf._addValue(_v, \"name\", \"_dispose_object\");");
                e.w.line(l, "var _aa = PIDL.JSONTools.addValue(_v, \"arguments\", PIDL.JSONTools.Type.Object);");
                e.w.line(l, "_intf._addValue(_aa, \"object_data\", object_data);");
                Self::write_send(e, l);
                e.w.line(level, "}");
                e.w.blank();
            }
        }
        Ok(())
    }

    fn write_object_interface(&self, e: &mut CsEmitter<'_>, level: usize) -> Result<(), CodegenError> {
        match e.role() {
            Role::Client => {
                e.w.line(level, "public interface _IObject");
                e.w.line(level, "{");
                e.w.line(level + 1, "string _id { get; }");
                e.w.line(level, "}");
            }
            Role::Server => {
                e.w.line(level, "protected interface _IObject");
                e.w.line(level, "{");
                e.w.line(level + 1, "string _id { get; }");
                e.w.line(level + 1, format!("{INVOKE_SIGNATURE};"));
                e.w.line(level, "}");
            }
        }
        e.w.blank();
        Ok(())
    }

    fn write_constructor_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Client {
            return Ok(());
        }
        let logging = Self::logging(e);
        if logging.is_enabled() {
            e.w.line(
                level,
                format!("_logger = {};", logging.init_logger(provider.logger_name())),
            );
        }
        for definition in provider.definitions() {
            match definition {
                Definition::Function(variant) | Definition::Method(variant) => {
                    self.write_function_closure(e, level, provider.is_object(), variant)?;
                }
                Definition::Property(property) => self.write_property_closures(e, level, property)?,
                Definition::TypeDefinition(_) | Definition::Object(_) => {}
            }
        }
        if !provider.is_object() {
            self.write_dispose_closure(e, level);
        }
        Ok(())
    }

    fn write_destructor_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        if provider.is_object() && e.role() == Role::Client {
            e.w.line(level, "if (_intf != null)");
            e.w.line(level, "{");
            e.w.line(level + 1, "try { _intf._dispose_object(_id); } catch (Exception) { }");
            e.w.line(level, "}");
        }
        Ok(())
    }

    fn write_function_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server {
            return Ok(());
        }
        if provider.is_object() {
            Self::write_envelope_start(e, level);
            Self::write_object_call(e, level, "method");
        } else {
            e.w.line(level, "var _intf = this;");
            Self::write_envelope_start(e, level);
            e.w.line(
                level,
                "var _v = PIDL.JSONTools.addValue(_root, \"function\", PIDL.JSONTools.Type.Object);",
            );
        }
        e.w.line(level, format!("_intf._addValue(_v, \"name\", \"{}\");", variant.name));
        e.w.line(level, format!("_intf._addValue(_v, \"variant\", \"{}\");", variant.variant_id()));
        e.w.line(
            level,
            "var _aa = PIDL.JSONTools.addValue(_v, \"arguments\", PIDL.JSONTools.Type.Object);",
        );
        for argument in variant.in_arguments() {
            e.w.line(level, format!("_intf._addValue(_aa, \"{0}\", {0});", argument.name));
        }
        Self::write_send(e, level);

        let returns = !variant.return_type.is_void();
        if returns {
            let ty = e.type_name(&variant.return_type)?;
            e.w.line(level, format!("{ty} _retval;"));
            e.w.line(level, "if (!_intf._getValue(_ret, \"retval\", out _retval, _ec))");
            e.w.line(level + 1, "_ec.ThrowException();");
        }

        let outputs: Vec<_> = variant.out_arguments().collect();
        if !outputs.is_empty() {
            e.w.line(level, "XElement _out_v;");
            e.w.line(
                level,
                "if (!_intf._getValue(_ret, \"output\", PIDL.JSONTools.Type.Object, out _out_v, _ec))",
            );
            e.w.line(level + 1, "_ec.ThrowException();");
            e.w.line(level, "if (");
            for (i, argument) in outputs.iter().enumerate() {
                let lead = if i == 0 { "  " } else { "| " };
                e.w.line(
                    level + 1,
                    format!("{lead}!_intf._getValue(_out_v, \"{0}\", out {0}, _ec)", argument.name),
                );
            }
            e.w.line(level, ")");
            e.w.line(level + 1, "_ec.ThrowException();");
        }

        if returns {
            e.w.line(level, "return _retval;");
        }
        Ok(())
    }

    fn write_property_getter_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server {
            return Ok(());
        }
        Self::write_envelope_start(e, level);
        Self::write_object_call(e, level, "property_get");
        e.w.line(level, format!("_intf._addValue(_v, \"name\", \"{}\");", property.name));
        Self::write_send(e, level);
        let ty = e.type_name(&property.ty)?;
        e.w.line(level, format!("{ty} _retval;"));
        e.w.line(level, "if (!_intf._getValue(_ret, \"retval\", out _retval, _ec))");
        e.w.line(level + 1, "_ec.ThrowException();");
        e.w.line(level, "return _retval;");
        Ok(())
    }

    fn write_property_setter_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server {
            return Ok(());
        }
        Self::write_envelope_start(e, level);
        Self::write_object_call(e, level, "property_set");
        e.w.line(level, format!("_intf._addValue(_v, \"name\", \"{}\");", property.name));
        e.w.line(level, "_intf._addValue(_v, \"value\", value);");
        Self::write_send(e, level);
        Ok(())
    }

    fn write_invoke(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Client {
            if !provider.is_object() {
                e.w.line(level, INVOKE_STATUS);
                e.w.line(level, format!("protected abstract {INVOKE_SIGNATURE};"));
                e.w.blank();
            }
            return Ok(());
        }

        let l = level + 1;
        if !provider.is_object() {
            e.w.line(level, INVOKE_STATUS);
        }
        e.w.line(level, format!("public {INVOKE_SIGNATURE}"));
        e.w.line(level, "{");
        e.w.line(l, "ret = null;");
        e.w.line(l, "XElement v;");

        if provider.is_object() {
            for (i, (key, variant)) in [("method", None), ("property_get", Some("\"get\"")), ("property_set", Some("\"set\""))]
                .into_iter()
                .enumerate()
            {
                let keyword = if i == 0 { "if" } else { "else if" };
                e.w.line(
                    l,
                    format!(
                        "{keyword} (PIDL.JSONTools.getValue(root, \"{key}\", out v) && PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Object))"
                    ),
                );
                e.w.line(l, "{");
                e.w.line(l + 1, "string name;");
                e.w.line(l + 1, "if (!_intf._getValue(v, \"name\", out name, ec))");
                e.w.line(l + 2, "return _InvokeStatus.MarshallingError;");
                if variant.is_none() {
                    e.w.line(l + 1, "string variant;");
                    e.w.line(l + 1, "if (!PIDL.JSONTools.getValue(v, \"variant\", out variant))");
                    e.w.line(l + 2, "variant = \"\";");
                }
                e.w.line(
                    l + 1,
                    format!(
                        "return _callFunction(name, {}, v, out ret, ec);",
                        variant.unwrap_or("variant")
                    ),
                );
                e.w.line(l, "}");
            }
        } else {
            let logging = Self::logging(e);
            log_line(e, l, logging.start("_logger"));
            e.w.line(l, "int version;");
            e.w.line(l, "if (!PIDL.JSONTools.getValue(root, \"version\", out version))");
            e.w.line(
                l,
                "{ ec.Add(-1, \"could not detect marshalling version\"); return _InvokeStatus.MarshallingError; }",
            );
            e.w.line(l, format!("if (version != {MARSHALLING_VERSION})"));
            e.w.line(
                l,
                "{ ec.Add(-1, \"unsupported marshalling version detected\"); return _InvokeStatus.NotSupportedMarshallingVersion; }",
            );
            e.w.line(
                l,
                "if (PIDL.JSONTools.getValue(root, \"function\", out v) && PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Object))",
            );
            e.w.line(l, "{");
            e.w.line(l + 1, "string name, variant;");
            e.w.line(l + 1, "if (!_getValue(v, \"name\", out name, ec))");
            e.w.line(l + 2, "return _InvokeStatus.MarshallingError;");
            e.w.line(l + 1, "if (!PIDL.JSONTools.getValue(v, \"variant\", out variant))");
            e.w.line(l + 2, "variant = \"\";");
            e.w.line(l + 1, "return _callFunction(name, variant, v, out ret, ec);");
            e.w.line(l, "}");
            e.w.line(
                l,
                "else if (PIDL.JSONTools.getValue(root, \"object_call\", out v) && PIDL.JSONTools.checkType(v, PIDL.JSONTools.Type.Object))",
            );
            e.w.line(l, "{");
            e.w.line(l + 1, "string object_data;");
            e.w.line(l + 1, "if (!_getValue(v, \"object_data\", out object_data, ec))");
            e.w.line(l + 2, "return _InvokeStatus.MarshallingError;");
            e.w.line(l + 1, "var obj = _get_object(object_data, ec);");
            e.w.line(l + 1, "if (obj == null)");
            e.w.line(l + 2, "return _InvokeStatus.Error;");
            e.w.line(l + 1, "return obj._invoke(v, out ret, ec);");
            e.w.line(l, "}");
        }
        e.w.line(l, "return _InvokeStatus.MarshallingError;");
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }
}
