//! JSON marshalling for C++ on top of the STL and rapidjson.
//!
//! Client stubs build a request envelope and pass it to the user supplied
//! `_invoke`; server skeletons parse the envelope and route it through a
//! `name -> variantId -> closure` table filled in the constructor.

use super::context::{Mode, Role};
use super::cpp::{class_path, CppCodeGen, CppEmitter, CppMarshalling};
use super::helper::{CodeGenHelper, Include};
use super::logging::LoggingStyle;
use super::{string_literal, MARSHALLING_VERSION};
use crate::ast::{Definition, DefinitionProvider, FunctionVariant, Property, Structure, Type};
use crate::error::CodegenError;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStl;

impl CppCodeGen<JsonStl> {
    /// C++ generator with JSON marshalling.
    pub fn json_stl(helper: Box<dyn CodeGenHelper>) -> Self {
        CppCodeGen::new(helper, JsonStl)
    }
}

const SIGNATURE: &str =
    "(const rapidjson::Value & root, rapidjson::Document & ret, _error_collector & ec)";
const CLOSURE: &str =
    "[&](const rapidjson::Value & r, rapidjson::Document & ret, _error_collector & ec)->_invoke_status {";

const ALIASES: &[(usize, &str)] = &[
    (0, "template<typename T> using nullable = PIDL::Nullable<T>;"),
    (0, "template<typename T> using nullable_const_ref = PIDL::NullableConstRef<T>;"),
    (0, "template<typename T> using array = std::vector<T>;"),
    (0, "using string = std::string;"),
    (0, "using datetime = PIDL::DateTime;"),
    (0, "using blob = std::vector<char>;"),
    (0, "using exception = PIDL::Exception;"),
    (0, "using _error_collector = PIDL::ErrorCollector;"),
    (0, "using _invoke_status = PIDL::JSONTools::InvokeStatus;"),
    (0, ""),
];

const INVOKE_CALL: &[(usize, &str)] = &[
    (0, "switch(status)"),
    (0, "{"),
    (0, "case _invoke_status::Ok: break;"),
    (0, "case _invoke_status::NotImplemented:"),
    (1, r#"ec.add((long)status, "function is not implemented"); return false;"#),
    (0, "case _invoke_status::Error:"),
    (1, r#"ec.add((long)status, "error while executing server function"); return false;"#),
    (0, "case _invoke_status::FatalError:"),
    (1, r#"ec.add((long)status, "fatal error while executing server function"); return false;"#),
    (0, "case _invoke_status::MarshallingError:"),
    (1, r#"ec.add((long)status, "error while marshalling of function call"); return false;"#),
    (0, "case _invoke_status::NotSupportedMarshallingVersion:"),
    (1, r#"ec.add((long)status, "not supported marshalling version"); return false;"#),
    (0, "}"),
    (0, ""),
    (0, "return true;"),
];

const GENERIC_GET_VALUE: &[(usize, &str)] = &[
    (0, "bool _getValue(const rapidjson::Value & v, const char * name, rapidjson::Type type, rapidjson::Value *& ret, _error_collector & ec)"),
    (0, "{"),
    (1, "if (!PIDL::JSONTools::getValue(v, name, ret))"),
    (1, r#"{ ec << std::string() + "value '" + name + "' is not found"; return false; }"#),
    (1, "if (ret->GetType() != type)"),
    (1, r#"{ ec << std::string() + "value '" + name + "' is invalid"; return false; }"#),
    (1, "return true;"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> bool _getValue(const rapidjson::Value & v, T & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "if (!PIDL::JSONTools::getValue(v, ret))"),
    (1, r#"{ ec << "value is invalid"; return false; }"#),
    (1, "return true;"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> bool _getValue(const rapidjson::Value & r, const char * name, T & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "rapidjson::Value * v;"),
    (1, "if (!PIDL::JSONTools::getValue(r, name, v) || v->IsNull())"),
    (1, r#"{ ec << std::string() + "value '" + name + "' is not found or null"; return false; }"#),
    (1, "return _getValue(*v, ret, ec);"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> bool _getValue(const rapidjson::Value & v, nullable<T> & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "if (v.IsNull())"),
    (1, "{ ret.setNull(); return true; }"),
    (1, "return _getValue(v, ret.setNotNull(), ec);"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> bool _getValue(const rapidjson::Value & r, const char * name, nullable<T> & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "rapidjson::Value * v;"),
    (1, "if (!PIDL::JSONTools::getValue(r, name, v))"),
    (1, r#"{ ec << std::string() + "value '" + name + "' is not found"; return false; }"#),
    (1, "return _getValue(*v, ret, ec);"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> bool _getValue(const rapidjson::Value & v, array<T> & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "if (!v.IsArray()) return false;"),
    (1, "ret.resize(v.Size());"),
    (1, "size_t i(0);"),
    (1, "bool has_error = false;"),
    (1, "for (auto it = v.Begin(); it != v.End(); ++it)"),
    (2, "if (!_getValue(*it, ret[i++], ec)) has_error = true;"),
    (1, "return !has_error;"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> bool _getValue(const rapidjson::Value & r, const char * name, array<T> & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "rapidjson::Value * v;"),
    (1, "if (!PIDL::JSONTools::getValue(r, name, v))"),
    (1, r#"{ ec << std::string() + "value '" + name + "' is not found"; return false; }"#),
    (1, "return _getValue(*v, ret, ec);"),
    (0, "}"),
    (0, ""),
    (0, "bool _getValue(const rapidjson::Value & v, blob & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "return _getValue<blob>(v, ret, ec);"),
    (0, "}"),
    (0, ""),
    (0, "bool _getValue(const rapidjson::Value & r, const char * name, blob & ret, _error_collector & ec)"),
    (0, "{"),
    (1, "return _getValue<blob>(r, name, ret, ec);"),
    (0, "}"),
    (0, ""),
];

const GENERIC_CREATE_VALUE: &[(usize, &str)] = &[
    (0, "template<typename T> rapidjson::Value _createValue(rapidjson::Document & doc, const T & t)"),
    (0, "{ return PIDL::JSONTools::createValue(doc, t); }"),
    (0, ""),
    (0, "template<typename T> rapidjson::Value _createValue(rapidjson::Document & doc, const array<T> & values)"),
    (0, "{"),
    (1, "rapidjson::Value v(rapidjson::kArrayType);"),
    (1, "for (auto & _v : values)"),
    (1, "{ auto tmp = _createValue(doc, _v); v.PushBack(tmp, doc.GetAllocator()); }"),
    (1, "return v;"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> rapidjson::Value _createValue(rapidjson::Document & doc, const nullable<T> & value)"),
    (0, "{"),
    (1, "if (value.isNull()) return rapidjson::Value(rapidjson::kNullType);"),
    (1, "return _createValue(doc, *value);"),
    (0, "}"),
    (0, ""),
    (0, "rapidjson::Value _createValue(rapidjson::Document & doc, const blob & data)"),
    (0, "{ return PIDL::JSONTools::createValue(doc, data); }"),
    (0, ""),
    (0, "template<typename T> void _addValue(rapidjson::Document & doc, rapidjson::Value & r, const char * name, const T & v)"),
    (0, "{ auto tmp = _createValue(doc, v); PIDL::JSONTools::addValue(doc, r, name, tmp); }"),
    (0, ""),
    (0, "template<typename T> void _addValue(rapidjson::Document & doc, rapidjson::Value & r, const char * name, const array<T> & values)"),
    (0, "{ auto tmp = _createValue<T>(doc, values); PIDL::JSONTools::addValue(doc, r, name, tmp); }"),
    (0, ""),
    (0, "void _addValue(rapidjson::Document & doc, rapidjson::Value & r, const char * name, const blob & data)"),
    (0, "{ PIDL::JSONTools::addValue(doc, r, name, data); }"),
    (0, ""),
    (0, "template<typename T> void _addValue(rapidjson::Document & doc, rapidjson::Value & r, const char * name, const nullable_const_ref<T> & v)"),
    (0, "{"),
    (1, "if (v.isNull()) PIDL::JSONTools::addNull(doc, r, name);"),
    (1, "else _addValue(doc, r, name, *v);"),
    (0, "}"),
    (0, ""),
    (0, "template<typename T> void _addValue(rapidjson::Document & doc, rapidjson::Value & r, const char * name, const nullable<T> & v)"),
    (0, "{"),
    (1, "if (v.isNull()) PIDL::JSONTools::addNull(doc, r, name);"),
    (1, "else _addValue(doc, r, name, *v);"),
    (0, "}"),
    (0, ""),
];

const GET_OBJECT: &[(usize, &str)] = &[
    (0, "virtual _Object::Ptr _get_object(const std::string & object_data, _error_collector & ec) = 0;"),
    (0, "template<class Object_T> typename Object_T::Ptr _get_object(const std::string & object_data, _error_collector & ec)"),
    (0, "{"),
    (1, "auto o = _get_object(object_data, ec);"),
    (1, "if (!o) return nullptr;"),
    (1, "auto ret = std::dynamic_pointer_cast<Object_T, _Object>(o);"),
    (1, r#"if (!ret) ec.add(-1, "unexpected: invalid object type for id '" + object_data + "'");"#),
    (1, "return ret;"),
    (0, "}"),
    (0, "virtual void _dispose_object(const std::string & object_data) = 0;"),
];

fn write_lines(e: &mut CppEmitter<'_>, level: usize, lines: &[(usize, &str)]) {
    for (indent, text) in lines {
        if text.is_empty() {
            e.w.blank();
        } else {
            e.w.line(level + indent, text);
        }
    }
}

/// Named types of an interface that need their own marshaller pair.
enum Marshalled<'a> {
    Structure { name: String, structure: &'a Structure },
    Object { name: String },
}

fn collect_marshalled<'a>(e: &CppEmitter<'a>, definitions: &'a [Definition], out: &mut Vec<Marshalled<'a>>) {
    for definition in definitions {
        match definition {
            Definition::TypeDefinition(td) => {
                if let Type::Structure(structure) = &*td.ty {
                    out.push(Marshalled::Structure {
                        name: e.scoped(&td.scope, &td.name),
                        structure,
                    });
                }
            }
            Definition::Object(handle) => {
                out.push(Marshalled::Object {
                    name: e.scoped(&handle.scope, &handle.name),
                });
                collect_marshalled(e, &e.document().object(handle).definitions, out);
            }
            _ => {}
        }
    }
}

/// Appends `;` to a logging fragment, or nothing when logging is off.
fn log_line(e: &mut CppEmitter<'_>, level: usize, fragment: String) {
    if !fragment.is_empty() {
        e.w.line(level, format!("{fragment};"));
    }
}

impl JsonStl {
    fn logging<'a>(e: &CppEmitter<'a>) -> &'a dyn LoggingStyle {
        e.helper().logging()
    }

    fn write_dispatch_members(&self, e: &mut CppEmitter<'_>, level: usize) {
        let logging = Self::logging(e);
        if logging.is_enabled() {
            e.w.line(level, format!("{} _logger;", logging.logger_type()));
        }
        e.w.line(
            level,
            format!("typedef std::function<_invoke_status{SIGNATURE}> _Function;"),
        );
        e.w.line(level, "struct _Variants { std::map<std::string, _Function> data; };");
        e.w.line(level, "std::map<std::string, _Variants> _functions;");

        e.w.line(
            level,
            "_invoke_status _callFunction(const std::string & name, const std::string & variant, const rapidjson::Value & root, rapidjson::Document & ret, _error_collector & ec)",
        );
        e.w.line(level, "{");
        let l = level + 1;
        e.w.line(l, "if (!_functions.count(name))");
        e.w.line(l, "{");
        log_line(e, l + 1, logging.warning("_logger", "\"function '\" + name + \"' is not found\""));
        e.w.line(l + 1, "ec << \"function '\" + name + \"' is not found\";");
        e.w.line(l + 1, "return _invoke_status::NotImplemented;");
        e.w.line(l, "}");
        e.w.line(l, "auto & vars = _functions[name].data;");
        e.w.line(l, "if (!variant.length() && vars.size() == 1)");
        e.w.line(l + 1, "return vars.begin()->second(root, ret, ec);");
        e.w.line(l, "if (!vars.count(variant))");
        e.w.line(l, "{");
        log_line(
            e,
            l + 1,
            logging.warning("_logger", "\"variant '\" + variant + \"' of function '\" + name + \"' is not found\""),
        );
        e.w.line(
            l + 1,
            "ec << \"variant '\" + variant + \"' of function '\" + name + \"' is not found\";",
        );
        e.w.line(l + 1, "return _invoke_status::NotImplemented;");
        e.w.line(l, "}");
        e.w.line(l, "return vars[variant](root, ret, ec);");
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(
            level,
            "_invoke_status _callFunction(std::function<void(void)> func, _error_collector & ec)",
        );
        e.w.line(level, "{");
        e.w.line(l, "try");
        e.w.line(l, "{");
        e.w.line(l + 1, "func();");
        e.w.line(l, "}");
        e.w.line(l, "catch (exception * e)");
        e.w.line(l, "{");
        e.w.line(l + 1, "e->get(ec);");
        log_line(e, l + 1, logging.error("_logger", "\"server function failed\""));
        e.w.line(l + 1, "return _invoke_status::Error;");
        e.w.line(l, "}");
        e.w.line(l, "catch (std::exception * e)");
        e.w.line(l, "{");
        e.w.line(
            l + 1,
            "ec.add((long)_invoke_status::FatalError, std::string() + \"unhandled exception: '\" + e->what() + \"'\");",
        );
        log_line(e, l + 1, logging.fatal("_logger", "std::string(\"unhandled exception: \") + e->what()"));
        e.w.line(l + 1, "return _invoke_status::FatalError;");
        e.w.line(l, "}");
        e.w.line(l, "catch (...)");
        e.w.line(l, "{");
        e.w.line(l + 1, "ec.add((long)_invoke_status::FatalError, \"unknown unhandled exception\");");
        log_line(e, l + 1, logging.fatal("_logger", "\"unknown unhandled exception\""));
        e.w.line(l + 1, "return _invoke_status::FatalError;");
        e.w.line(l, "}");
        e.w.line(l, "return _invoke_status::Ok;");
        e.w.line(level, "}");
        e.w.blank();
    }

    fn write_invoke_call(&self, e: &mut CppEmitter<'_>, level: usize, provider: DefinitionProvider<'_>) {
        e.w.line(
            level,
            "bool _invokeCall(const rapidjson::Value & root, rapidjson::Document & ret, _error_collector & ec)",
        );
        e.w.line(level, "{");
        let target = if provider.is_object() { "_intf" } else { "_that" };
        e.w.line(level + 1, format!("auto status = {target}->_invoke(root, ret, ec);"));
        write_lines(e, level + 1, INVOKE_CALL);
        e.w.line(level, "}");
        e.w.blank();
    }

    fn write_structure_marshallers(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        name: &str,
        label: &str,
        structure: &Structure,
    ) {
        e.w.line(
            level,
            format!("bool _getValue(const rapidjson::Value & v, {name} & ret, _error_collector & ec)"),
        );
        e.w.line(level, "{");
        e.w.line(level + 1, "if (!v.IsObject())");
        e.w.line(
            level + 1,
            format!("{{ ec << std::string() + \"value of '{label}' is not object\"; return false; }}"),
        );
        if structure.members.is_empty() {
            e.w.line(level + 1, "return true;");
        } else {
            e.w.line(level + 1, "return");
            for (i, member) in structure.members.iter().enumerate() {
                let lead = if i == 0 { "  " } else { "& " };
                e.w.line(
                    level + 2,
                    format!("{lead}_getValue(v, \"{0}\", ret.{0}, ec)", member.name),
                );
            }
            e.w.line(level + 1, ";");
        }
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(
            level,
            format!("rapidjson::Value _createValue(rapidjson::Document & doc, const {name} & in)"),
        );
        e.w.line(level, "{");
        e.w.line(level + 1, "rapidjson::Value v(rapidjson::kObjectType);");
        for member in &structure.members {
            e.w.line(level + 1, format!("_addValue(doc, v, \"{0}\", in.{0});", member.name));
        }
        e.w.line(level + 1, "return v;");
        e.w.line(level, "}");
        e.w.blank();
    }

    fn write_object_marshallers(&self, e: &mut CppEmitter<'_>, level: usize, name: &str) {
        e.w.line(
            level,
            format!("bool _getValue(const rapidjson::Value & v, {name}::Ptr & ret, _error_collector & ec)"),
        );
        e.w.line(level, "{");
        match e.role() {
            Role::Client => {
                e.w.line(level + 1, "std::string object_data;");
                e.w.line(level + 1, "if (!_getValue(v, object_data, ec))");
                e.w.line(level + 2, "return false;");
                e.w.line(level + 1, format!("ret = std::make_shared<{name}>(_that, object_data);"));
                e.w.line(level + 1, "return true;");
                e.w.line(level, "}");
                e.w.blank();
            }
            Role::Server => {
                e.w.line(level + 1, "std::string object_data;");
                e.w.line(level + 1, "if (!PIDL::JSONTools::getValue(v, object_data))");
                e.w.line(level + 1, "{ ec << \"value is invalid\"; return false; }");
                e.w.line(
                    level + 1,
                    format!("return (bool)(ret = _that->_get_object<{name}>(object_data, ec));"),
                );
                e.w.line(level, "}");
                e.w.blank();

                e.w.line(
                    level,
                    format!("bool _getValue(const rapidjson::Value & r, const char * name, {name}::Ptr & ret, _error_collector & ec)"),
                );
                e.w.line(level, "{");
                e.w.line(level + 1, "rapidjson::Value * v;");
                e.w.line(level + 1, "if (!PIDL::JSONTools::getValue(r, name, v))");
                e.w.line(
                    level + 1,
                    "{ ec << std::string() + \"value '\" + name + \"' is not found or null\"; return false; }",
                );
                e.w.line(level + 1, "if (v->IsNull())");
                e.w.line(level + 1, "{ ret = nullptr; return true; }");
                e.w.line(level + 1, "return _getValue(*v, ret, ec);");
                e.w.line(level, "}");
                e.w.blank();
            }
        }

        e.w.line(
            level,
            format!("rapidjson::Value _createValue(rapidjson::Document & doc, const {name}::Ptr & in)"),
        );
        e.w.line(level, "{");
        e.w.line(level + 1, "if (!in) return rapidjson::Value(rapidjson::kNullType);");
        e.w.line(level + 1, "return PIDL::JSONTools::createValue(doc, in->_id());");
        e.w.line(level, "}");
        e.w.blank();
    }

    /// Tuples travel as JSON arrays, element `i` at position `i`.
    fn write_tuple_marshallers(&self, e: &mut CppEmitter<'_>, level: usize, ty: &Type) -> Result<(), CodegenError> {
        let name = e.type_name(ty)?;
        let size = ty.components().len();
        e.w.line(
            level,
            format!("bool _getValue(const rapidjson::Value & v, {name} & ret, _error_collector & ec)"),
        );
        e.w.line(level, "{");
        e.w.line(level + 1, format!("if (!v.IsArray() || v.Size() != {size})"));
        e.w.line(
            level + 1,
            format!("{{ ec << \"value is not a tuple of {size} elements\"; return false; }}"),
        );
        e.w.line(level + 1, "return");
        for i in 0..size {
            let lead = if i == 0 { "  " } else { "& " };
            e.w.line(
                level + 2,
                format!("{lead}_getValue(v[rapidjson::SizeType({i})], std::get<{i}>(ret), ec)"),
            );
        }
        e.w.line(level + 1, ";");
        e.w.line(level, "}");
        e.w.blank();

        e.w.line(
            level,
            format!("rapidjson::Value _createValue(rapidjson::Document & doc, const {name} & in)"),
        );
        e.w.line(level, "{");
        e.w.line(level + 1, "rapidjson::Value v(rapidjson::kArrayType);");
        for i in 0..size {
            e.w.line(
                level + 1,
                format!("{{ auto tmp = _createValue(doc, std::get<{i}>(in)); v.PushBack(tmp, doc.GetAllocator()); }}"),
            );
        }
        e.w.line(level + 1, "return v;");
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }

    fn write_marshallers(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        e.w.line(level, "//marshallers");
        write_lines(e, level, GENERIC_GET_VALUE);

        let mut named = Vec::new();
        collect_marshalled(e, provider.definitions(), &mut named);
        for item in &named {
            match item {
                Marshalled::Structure { name, structure } => {
                    let label = name.rsplit("::").next().unwrap_or(name);
                    self.write_structure_marshallers(e, level, name, label, structure);
                }
                Marshalled::Object { name } => self.write_object_marshallers(e, level, name),
            }
        }

        let prebuilt: Vec<_> = e.prebuilt().iter().cloned().collect();
        for entry in &prebuilt {
            match &*entry.ty {
                Type::Structure(structure) => {
                    let name = e.prebuilt_name(entry.index);
                    let label = format!("_Prebuilt{}", entry.index);
                    self.write_structure_marshallers(e, level, &name, &label, structure);
                }
                ty => self.write_tuple_marshallers(e, level, ty)?,
            }
        }

        write_lines(e, level, GENERIC_CREATE_VALUE);
        Ok(())
    }

    /// Pointer to the body holding the marshallers, as seen from a dispatch closure.
    fn write_intf_pointer(e: &mut CppEmitter<'_>, level: usize, is_object: bool) {
        let text = match (is_object, e.mode()) {
            (false, _) => "auto _intf_p = this;",
            (true, Mode::AllInOne) => "auto _intf_p = _intf;",
            (true, Mode::Implementation) => "auto _intf_p = _intf->_priv;",
            (true, Mode::Declaration) => return,
        };
        e.w.line(level, text);
    }

    fn write_function_closure(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        is_object: bool,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError> {
        let logging = Self::logging(e);
        e.w.line(
            level,
            format!(
                "_functions[\"{}\"].data[\"{}\"] = {CLOSURE}",
                variant.name,
                variant.variant_id()
            ),
        );
        let l = level + 1;
        Self::write_intf_pointer(e, l, is_object);
        log_line(e, l, logging.trace("_logger", &string_literal(&variant.name)));
        for argument in &variant.arguments {
            let ty = e.type_name(&argument.ty)?;
            e.w.line(l, format!("{ty} _arg_{};", argument.name));
        }

        let inputs: Vec<_> = variant.in_arguments().collect();
        if !inputs.is_empty() {
            e.w.line(l, "rapidjson::Value * aa;");
            e.w.line(
                l,
                "if (!_intf_p->_getValue(r, \"arguments\", rapidjson::kObjectType, aa, ec))",
            );
            e.w.line(l + 1, "return _invoke_status::MarshallingError;");
            e.w.line(l, "if (");
            for (i, argument) in inputs.iter().enumerate() {
                let lead = if i == 0 { "" } else { "| " };
                e.w.line(
                    l + 1,
                    format!("{lead}!_intf_p->_getValue(*aa, \"{0}\", _arg_{0}, ec)", argument.name),
                );
            }
            e.w.line(l, ")");
            e.w.line(l + 1, "return _invoke_status::MarshallingError;");
        }

        let returns = !variant.return_type.is_void();
        if returns {
            let ty = e.type_name(&variant.return_type)?;
            e.w.line(l, format!("{ty} retval;"));
        }
        let arguments: Vec<String> = variant
            .arguments
            .iter()
            .map(|a| format!("_arg_{}", a.name))
            .collect();
        e.w.line(
            l,
            format!(
                "auto stat = _callFunction([&](){{{} _that->{}({}); }}, ec);",
                if returns { " retval =" } else { "" },
                variant.name,
                arguments.join(", ")
            ),
        );
        e.w.line(l, "if (stat != _invoke_status::Ok)");
        e.w.line(l + 1, "return stat;");
        e.w.line(l, "ret.SetObject();");
        if returns {
            e.w.line(l, "_intf_p->_addValue(ret, ret, \"retval\", retval);");
        }
        let outputs: Vec<_> = variant.out_arguments().collect();
        if !outputs.is_empty() {
            e.w.line(l, "rapidjson::Value out_v(rapidjson::kObjectType);");
            for argument in outputs {
                e.w.line(
                    l,
                    format!("_intf_p->_addValue(ret, out_v, \"{0}\", _arg_{0});", argument.name),
                );
            }
            e.w.line(l, "PIDL::JSONTools::addValue(ret, ret, \"output\", out_v);");
        }
        e.w.line(l, "return _invoke_status::Ok;");
        e.w.line(level, "};");
        e.w.blank();
        Ok(())
    }

    fn write_property_closures(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        let logging = Self::logging(e);
        let ty = e.type_name(&property.ty)?;
        let l = level + 1;

        e.w.line(
            level,
            format!("_functions[\"{}\"].data[\"get\"] = {CLOSURE}", property.name),
        );
        Self::write_intf_pointer(e, l, true);
        log_line(e, l, logging.trace("_logger", &string_literal(&format!("get_{}", property.name))));
        e.w.line(l, format!("{ty} retval;"));
        e.w.line(
            l,
            format!(
                "auto stat = _callFunction([&](){{ retval = _that->get_{}(); }}, ec);",
                property.name
            ),
        );
        e.w.line(l, "if (stat != _invoke_status::Ok)");
        e.w.line(l + 1, "return stat;");
        e.w.line(l, "ret.SetObject();");
        e.w.line(l, "_intf_p->_addValue(ret, ret, \"retval\", retval);");
        e.w.line(l, "return _invoke_status::Ok;");
        e.w.line(level, "};");
        e.w.blank();

        if !property.readonly {
            e.w.line(
                level,
                format!("_functions[\"{}\"].data[\"set\"] = {CLOSURE}", property.name),
            );
            Self::write_intf_pointer(e, l, true);
            log_line(e, l, logging.trace("_logger", &string_literal(&format!("set_{}", property.name))));
            e.w.line(l, format!("{ty} value;"));
            e.w.line(l, "if (!_intf_p->_getValue(r, \"value\", value, ec))");
            e.w.line(l + 1, "return _invoke_status::MarshallingError;");
            e.w.line(
                l,
                format!(
                    "return _callFunction([&](){{ _that->set_{}(value); }}, ec);",
                    property.name
                ),
            );
            e.w.line(level, "};");
            e.w.blank();
        }
        Ok(())
    }

    fn write_dispose_closure(&self, e: &mut CppEmitter<'_>, level: usize) {
        let l = level + 1;
        e.w.line(
            level,
            format!("_functions[\"_dispose_object\"].data[std::string()] = {CLOSURE}"),
        );
        Self::write_intf_pointer(e, l, false);
        e.w.line(l, "std::string _arg_object_data;");
        e.w.line(l, "rapidjson::Value * aa;");
        e.w.line(
            l,
            "if (!_intf_p->_getValue(r, \"arguments\", rapidjson::kObjectType, aa, ec))",
        );
        e.w.line(l + 1, "return _invoke_status::MarshallingError;");
        e.w.line(l, "if (!_intf_p->_getValue(*aa, \"object_data\", _arg_object_data, ec))");
        e.w.line(l + 1, "return _invoke_status::MarshallingError;");
        e.w.line(
            l,
            "return _callFunction([&]() { _that->_dispose_object(_arg_object_data); }, ec);",
        );
        e.w.line(level, "};");
    }

    /// Local `_p`/`_intf_p` pointers at the top of a client body.
    fn write_client_pointers(e: &mut CppEmitter<'_>, level: usize, is_method: bool) {
        let (p, intf_p) = match (e.mode(), is_method) {
            (Mode::AllInOne, true) => ("this", "_p->_intf"),
            (Mode::AllInOne, false) => ("this", "this"),
            (Mode::Implementation, true) => ("_priv", "_p->_intf->_priv"),
            (Mode::Implementation, false) => ("_priv", "_p"),
            (Mode::Declaration, _) => return,
        };
        e.w.line(level, format!("auto _p = {p};"));
        e.w.line(level, format!("auto _intf_p = {intf_p};"));
        e.w.blank();
    }

    fn write_envelope_start(e: &mut CppEmitter<'_>, level: usize) {
        e.w.line(level, "PIDL::ExceptionErrorCollector<_error_collector> _ec;");
        e.w.line(level, "rapidjson::Document _doc;");
        e.w.line(level, "_doc.SetObject();");
        e.w.line(
            level,
            format!("_intf_p->_addValue(_doc, _doc, \"version\", {MARSHALLING_VERSION});"),
        );
    }

    /// Sends `_doc` and throws on failure; `caller` owns the `_invokeCall` used.
    fn write_send(e: &mut CppEmitter<'_>, level: usize, caller: &str) {
        e.w.line(level, "rapidjson::Document _ret;");
        e.w.line(level, format!("if (!{caller}->_invokeCall(_doc, _ret, _ec))"));
        e.w.line(level + 1, "_ec.throwException();");
    }
}

impl CppMarshalling for JsonStl {
    fn write_includes(&self, e: &mut CppEmitter<'_>) -> Result<(), CodegenError> {
        if e.mode() != Mode::Declaration {
            e.w.line(0, Include::global("map").render());
            e.w.line(0, Include::global("functional").render());
        }
        for header in ["vector", "string", "memory", "tuple"] {
            e.w.line(0, Include::global(header).render());
        }
        let core = e.helper().core_include_path();
        for header in [
            "datetime.h",
            "exception.h",
            "nullable.h",
            "jsontools.h",
            "errorcollector.h",
        ] {
            e.w.line(0, core.join(header).render());
        }
        Ok(())
    }

    fn write_aliases(&self, e: &mut CppEmitter<'_>, level: usize) -> Result<(), CodegenError> {
        write_lines(e, level, ALIASES);
        Ok(())
    }

    fn write_object_base(&self, e: &mut CppEmitter<'_>, level: usize) -> Result<(), CodegenError> {
        e.w.line(level, "class _Object");
        e.w.line(level, "{");
        e.w.line(level, "public:");
        e.w.line(level + 1, "typedef std::shared_ptr<_Object> Ptr;");
        e.w.line(level + 1, "virtual ~_Object() = default;");
        if e.role() == Role::Server {
            e.w.line(
                level + 1,
                format!("virtual _invoke_status _invoke{SIGNATURE} = 0;"),
            );
        }
        e.w.line(level + 1, "virtual std::string _id() const = 0;");
        e.w.line(level, "};");
        e.w.blank();
        Ok(())
    }

    fn write_private_members(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        e.w.line(level, "//private members");
        e.w.blank();
        match e.role() {
            Role::Server => self.write_dispatch_members(e, level),
            Role::Client => self.write_invoke_call(e, level, provider),
        }
        if !provider.is_object() {
            self.write_marshallers(e, level, provider)?;
        }
        Ok(())
    }

    fn write_constructor_body(
        &self,
        e: &mut CppEmitter<'_>,
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
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        if provider.is_object() && e.role() == Role::Client {
            e.w.line(level, "try { _intf->_dispose_object(__id); } catch(...) { }");
        }
        Ok(())
    }

    fn write_function_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server {
            return Ok(());
        }
        let is_method = provider.is_object();
        Self::write_client_pointers(e, level, is_method);
        Self::write_envelope_start(e, level);
        if is_method {
            e.w.line(level, "rapidjson::Value _r(rapidjson::kObjectType);");
            e.w.line(level, "_intf_p->_addValue(_doc, _r, \"object_data\", _p->__id);");
        }
        e.w.line(level, "rapidjson::Value _v(rapidjson::kObjectType);");
        e.w.line(level, format!("_intf_p->_addValue(_doc, _v, \"name\", \"{}\");", variant.name));
        e.w.line(
            level,
            format!("_intf_p->_addValue(_doc, _v, \"variant\", \"{}\");", variant.variant_id()),
        );
        e.w.line(level, "rapidjson::Value _aa(rapidjson::kObjectType);");
        for argument in variant.in_arguments() {
            e.w.line(
                level,
                format!("_intf_p->_addValue(_doc, _aa, \"{0}\", {0});", argument.name),
            );
        }
        e.w.line(level, "PIDL::JSONTools::addValue(_doc, _v, \"arguments\", _aa);");
        if is_method {
            e.w.line(level, "PIDL::JSONTools::addValue(_doc, _r, \"method\", _v);");
            e.w.line(level, "PIDL::JSONTools::addValue(_doc, _doc, \"object_call\", _r);");
            Self::write_send(e, level, "_p");
        } else {
            e.w.line(level, "PIDL::JSONTools::addValue(_doc, _doc, \"function\", _v);");
            Self::write_send(e, level, "_intf_p");
        }

        let returns = !variant.return_type.is_void();
        if returns {
            let ty = e.type_name(&variant.return_type)?;
            e.w.line(level, format!("{ty} _retval;"));
            e.w.line(level, "if (!_intf_p->_getValue(_ret, \"retval\", _retval, _ec))");
            e.w.line(level + 1, "_ec.throwException();");
        }

        let outputs: Vec<_> = variant.out_arguments().collect();
        if !outputs.is_empty() {
            e.w.line(level, "rapidjson::Value * _out_v;");
            e.w.line(
                level,
                "if (!_intf_p->_getValue(_ret, \"output\", rapidjson::kObjectType, _out_v, _ec))",
            );
            e.w.line(level + 1, "_ec.throwException();");
            e.w.line(level, "if (");
            for (i, argument) in outputs.iter().enumerate() {
                let lead = if i == 0 { "" } else { "| " };
                e.w.line(
                    level + 1,
                    format!("{lead}!_intf_p->_getValue(*_out_v, \"{0}\", {0}, _ec)", argument.name),
                );
            }
            e.w.line(level, ")");
            e.w.line(level + 1, "_ec.throwException();");
        }

        if returns {
            e.w.line(level, "return _retval;");
        }
        Ok(())
    }

    fn write_property_getter_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server {
            return Ok(());
        }
        Self::write_client_pointers(e, level, true);
        Self::write_envelope_start(e, level);
        e.w.line(level, "rapidjson::Value _r(rapidjson::kObjectType);");
        e.w.line(level, "_intf_p->_addValue(_doc, _r, \"object_data\", _p->__id);");
        e.w.line(level, "rapidjson::Value _v(rapidjson::kObjectType);");
        e.w.line(level, format!("_intf_p->_addValue(_doc, _v, \"name\", \"{}\");", property.name));
        e.w.line(level, "PIDL::JSONTools::addValue(_doc, _r, \"property_get\", _v);");
        e.w.line(level, "PIDL::JSONTools::addValue(_doc, _doc, \"object_call\", _r);");
        Self::write_send(e, level, "_p");
        let ty = e.type_name(&property.ty)?;
        e.w.line(level, format!("{ty} _retval;"));
        e.w.line(level, "if (!_intf_p->_getValue(_ret, \"retval\", _retval, _ec))");
        e.w.line(level + 1, "_ec.throwException();");
        e.w.line(level, "return _retval;");
        Ok(())
    }

    fn write_property_setter_body(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        if e.role() == Role::Server {
            return Ok(());
        }
        Self::write_client_pointers(e, level, true);
        Self::write_envelope_start(e, level);
        e.w.line(level, "rapidjson::Value _r(rapidjson::kObjectType);");
        e.w.line(level, "_intf_p->_addValue(_doc, _r, \"object_data\", _p->__id);");
        e.w.line(level, "rapidjson::Value _v(rapidjson::kObjectType);");
        e.w.line(level, format!("_intf_p->_addValue(_doc, _v, \"name\", \"{}\");", property.name));
        e.w.line(level, "_intf_p->_addValue(_doc, _v, \"value\", value);");
        e.w.line(level, "PIDL::JSONTools::addValue(_doc, _r, \"property_set\", _v);");
        e.w.line(level, "PIDL::JSONTools::addValue(_doc, _doc, \"object_call\", _r);");
        Self::write_send(e, level, "_p");
        Ok(())
    }

    fn write_invoke(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        match (e.role(), e.mode()) {
            (Role::Client, Mode::Implementation) => return Ok(()),
            (Role::Client, _) => {
                if !provider.is_object() {
                    e.w.line(level, format!("virtual _invoke_status _invoke{SIGNATURE} = 0;"));
                }
                return Ok(());
            }
            (Role::Server, Mode::Declaration) => {
                e.w.line(level, format!("_invoke_status _invoke{SIGNATURE};"));
                return Ok(());
            }
            (Role::Server, Mode::AllInOne) => {
                e.w.line(level, format!("_invoke_status _invoke{SIGNATURE}"));
            }
            (Role::Server, Mode::Implementation) => {
                e.w.line(
                    level,
                    format!("_invoke_status {}::_invoke{SIGNATURE}", class_path(provider)),
                );
            }
        }

        let l = level + 1;
        let p = if e.mode() == Mode::AllInOne { "this" } else { "_priv" };
        e.w.line(level, "{");
        e.w.line(l, format!("auto * _p = {p};"));

        if provider.is_object() {
            if e.mode() == Mode::Implementation {
                e.w.line(l, "auto * _intf_p = _p->_intf->_priv;");
            } else {
                e.w.line(l, "auto * _intf_p = _p->_intf;");
            }
            e.w.blank();
            e.w.line(l, "rapidjson::Value * v;");
            for (i, (key, variant)) in [("method", None), ("property_get", Some("\"get\"")), ("property_set", Some("\"set\""))]
                .into_iter()
                .enumerate()
            {
                let keyword = if i == 0 { "if" } else { "else if" };
                e.w.line(
                    l,
                    format!("{keyword} (PIDL::JSONTools::getValue(root, \"{key}\", v) && v->IsObject())"),
                );
                e.w.line(l, "{");
                match variant {
                    None => e.w.line(l + 1, "std::string name, variant;"),
                    Some(_) => e.w.line(l + 1, "std::string name;"),
                }
                e.w.line(l + 1, "if (!_intf_p->_getValue(*v, \"name\", name, ec))");
                e.w.line(l + 2, "return _invoke_status::MarshallingError;");
                if variant.is_none() {
                    e.w.line(l + 1, "PIDL::JSONTools::getValue(*v, \"variant\", variant);");
                }
                e.w.line(l + 1, "ec.clear();");
                e.w.line(
                    l + 1,
                    format!(
                        "return _p->_callFunction(name, {}, *v, ret, ec);",
                        variant.unwrap_or("variant")
                    ),
                );
                e.w.line(l, "}");
            }
        } else {
            let logging = Self::logging(e);
            log_line(e, l, logging.start("_p->_logger"));
            e.w.blank();
            e.w.line(l, "int version;");
            e.w.line(l, "if (!PIDL::JSONTools::getValue(root, \"version\", version))");
            e.w.line(
                l,
                "{ ec << \"could not detect marshalling version\"; return _invoke_status::MarshallingError; }",
            );
            e.w.line(l, format!("if (version != {MARSHALLING_VERSION})"));
            e.w.line(
                l,
                "{ ec << \"unsupported marshalling version detected\"; return _invoke_status::NotSupportedMarshallingVersion; }",
            );
            e.w.blank();
            e.w.line(l, "rapidjson::Value * v;");
            e.w.line(l, "if (PIDL::JSONTools::getValue(root, \"function\", v) && v->IsObject())");
            e.w.line(l, "{");
            e.w.line(l + 1, "std::string name, variant;");
            e.w.line(l + 1, "if (!_p->_getValue(*v, \"name\", name, ec))");
            e.w.line(l + 2, "return _invoke_status::MarshallingError;");
            e.w.line(l + 1, "PIDL::JSONTools::getValue(*v, \"variant\", variant);");
            e.w.line(l + 1, "ec.clear();");
            e.w.line(l + 1, "return _p->_callFunction(name, variant, *v, ret, ec);");
            e.w.line(l, "}");
            e.w.line(l, "else if (PIDL::JSONTools::getValue(root, \"object_call\", v) && v->IsObject())");
            e.w.line(l, "{");
            e.w.line(l + 1, "std::string object_data;");
            e.w.line(l + 1, "if (!_p->_getValue(*v, \"object_data\", object_data, ec))");
            e.w.line(l + 2, "return _invoke_status::MarshallingError;");
            e.w.line(l + 1, "auto obj = _get_object(object_data, ec);");
            e.w.line(l + 1, "if (!obj)");
            e.w.line(l + 2, "return _invoke_status::Error;");
            e.w.line(l + 1, "return obj->_invoke(*v, ret, ec);");
            e.w.line(l, "}");
        }
        e.w.line(l, "return _invoke_status::MarshallingError;");
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }

    fn write_public_extras(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        if provider.is_object() || e.role() == Role::Server {
            return Ok(());
        }
        match e.mode() {
            Mode::Declaration => {
                e.w.line(level, "void _dispose_object(const std::string & object_data);");
                return Ok(());
            }
            Mode::AllInOne => {
                e.w.line(level, "void _dispose_object(const std::string & object_data)");
            }
            Mode::Implementation => {
                e.w.line(
                    level,
                    format!(
                        "void {}::_dispose_object(const std::string & object_data)",
                        class_path(provider)
                    ),
                );
            }
        }
        let l = level + 1;
        let p = if e.mode() == Mode::AllInOne { "this" } else { "_priv" };
        e.w.line(level, "{");
        e.w.line(l, format!("auto _p = {p};"));
        e.w.line(l, "auto _intf_p = _p;");
        e.w.blank();
        Self::write_envelope_start(e, l);
        e.w.line(l, "rapidjson::Value _v(rapidjson::kObjectType);");
        e.w.line(l, "_intf_p->_addValue(_doc, _v, \"name\", \"_dispose_object\");");
        e.w.line(l, "rapidjson::Value _aa(rapidjson::kObjectType);");
        e.w.line(l, "_intf_p->_addValue(_doc, _aa, \"object_data\", object_data);");
        e.w.line(l, "PIDL::JSONTools::addValue(_doc, _v, \"arguments\", _aa);");
        e.w.line(l, "PIDL::JSONTools::addValue(_doc, _doc, \"function\", _v);");
        Self::write_send(e, l, "_intf_p");
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }

    fn write_protected_extras(
        &self,
        e: &mut CppEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError> {
        if !provider.is_object() && e.role() == Role::Server && e.is_declaring() {
            write_lines(e, level, GET_OBJECT);
        }
        Ok(())
    }
}
