use super::context::{CodeWriter, EmissionContext, Mode, Role};
use super::documentation::{Documented, Place};
use super::helper::CodeGenHelper;
use super::prebuilt::PrebuiltRegistry;
use super::{identifier, string_literal, CodeGen};
use crate::ast::{
    Definition, DefinitionProvider, Direction, Document, FunctionVariant, Interface, Module,
    ObjectHandle, Property, Structure, TopLevel, Type, TypeDefinition,
};
use crate::error::CodegenError;

/// Largest tuple `System.Tuple` can hold without nesting.
pub const MAX_TUPLE_ARITY: usize = 7;

/// `A.B.Name` for a scoped name.
pub fn dotted(scope: &[String], name: &str) -> String {
    let mut parts = scope.to_vec();
    parts.push(name.to_string());
    parts.join(".")
}

/// Walk state for one C# generation call.
pub struct CsEmitter<'a> {
    document: &'a Document,
    ctx: EmissionContext,
    helper: &'a dyn CodeGenHelper,
    pub w: CodeWriter,
    interface: Option<&'a Interface>,
    prebuilt: PrebuiltRegistry,
}

impl<'a> CsEmitter<'a> {
    fn new(document: &'a Document, ctx: EmissionContext, helper: &'a dyn CodeGenHelper) -> Self {
        CsEmitter {
            document,
            ctx,
            helper,
            w: CodeWriter::new(helper.tab().unit()),
            interface: None,
            prebuilt: PrebuiltRegistry::new(),
        }
    }

    pub fn role(&self) -> Role {
        self.ctx.role
    }

    pub fn helper(&self) -> &'a dyn CodeGenHelper {
        self.helper
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn prebuilt(&self) -> &PrebuiltRegistry {
        &self.prebuilt
    }

    pub fn interface_name(&self) -> &'a str {
        self.interface.map(|i| i.name.as_str()).unwrap_or_default()
    }

    pub fn document_item(&mut self, level: usize, item: Documented<'_>, place: Place) {
        let helper = self.helper;
        helper.documentation().write(&mut self.w, level, item, place);
    }

    fn enter_interface(&mut self, interface: &'a Interface) {
        self.interface = Some(interface);
        self.prebuilt = PrebuiltRegistry::from_definitions(self.document, &interface.definitions);
    }

    fn leave_interface(&mut self) {
        self.interface = None;
        self.prebuilt = PrebuiltRegistry::new();
    }

    pub fn prebuilt_name(&self, index: usize) -> String {
        format!("{}._Prebuilt{index}", self.interface_name())
    }

    /// Whether the C# spelling of a type is a value type, i.e. needs
    /// `Nullable<>` to carry null.
    pub fn is_value_type(ty: &Type) -> bool {
        match ty {
            Type::Integer | Type::Float | Type::Boolean | Type::DateTime | Type::Structure(_) => true,
            Type::Definition(td) => Self::is_value_type(&td.ty),
            _ => false,
        }
    }

    /// C# spelling of a type.
    ///
    /// # Errors
    /// Fails for tuples wider than [`MAX_TUPLE_ARITY`] and anonymous
    /// structures outside any interface.
    pub fn type_name(&self, ty: &Type) -> Result<String, CodegenError> {
        Ok(match ty {
            Type::Integer => "long".to_string(),
            Type::Float => "double".to_string(),
            Type::Boolean => "bool".to_string(),
            Type::String => "string".to_string(),
            Type::DateTime => "DateTime".to_string(),
            Type::Blob => "byte[]".to_string(),
            Type::Void => "void".to_string(),
            Type::Nullable(inner) => {
                let name = self.type_name(inner)?;
                if Self::is_value_type(inner) {
                    format!("Nullable<{name}>")
                } else {
                    name
                }
            }
            Type::Array(inner) => format!("{}[]", self.type_name(inner)?),
            Type::Tuple(types) => {
                if types.is_empty() || types.len() > MAX_TUPLE_ARITY {
                    return Err(CodegenError::UnsupportedConstruct {
                        path: self.interface_name().to_string(),
                        message: format!(
                            "tuple of {} elements (C# supports 1 to {MAX_TUPLE_ARITY})",
                            types.len()
                        ),
                    });
                }
                let names = types
                    .iter()
                    .map(|t| self.type_name(t))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("Tuple<{}>", names.join(", "))
            }
            Type::Structure(_) => match self.prebuilt.index_of(ty) {
                Some(index) => self.prebuilt_name(index),
                None => {
                    return Err(CodegenError::UnsupportedConstruct {
                        path: self.interface_name().to_string(),
                        message: "anonymous structure outside of an interface".to_string(),
                    })
                }
            },
            Type::Definition(td) if td.is_structure() => dotted(&td.scope, &td.name),
            Type::Definition(td) => self.type_name(&td.ty)?,
            Type::Object(handle) => dotted(&handle.scope, &handle.name),
        })
    }
}

/// The body-level hooks a C# marshalling backend provides.
pub trait CsMarshalling {
    fn write_usings(&self, e: &mut CsEmitter<'_>) -> Result<(), CodegenError>;
    /// Fields and helpers at the top of an interface or object class.
    fn write_members(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;
    /// The `_IObject` interface every object class implements.
    fn write_object_interface(&self, e: &mut CsEmitter<'_>, level: usize) -> Result<(), CodegenError>;
    fn write_constructor_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;
    fn write_destructor_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;
    fn write_function_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError>;
    fn write_property_getter_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError>;
    fn write_property_setter_body(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError>;
    fn write_invoke(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        provider: DefinitionProvider<'_>,
    ) -> Result<(), CodegenError>;
}

/// C# dispatcher. Interfaces become abstract classes, objects nested
/// classes and modules namespaces. C# has no header/source split, so every
/// Mode renders the complete file.
#[derive(Debug)]
pub struct CsCodeGen<M> {
    helper: Box<dyn CodeGenHelper>,
    marshalling: M,
}

impl<M: CsMarshalling> CsCodeGen<M> {
    pub fn new(helper: Box<dyn CodeGenHelper>, marshalling: M) -> Self {
        CsCodeGen {
            helper,
            marshalling,
        }
    }

    pub fn helper(&self) -> &dyn CodeGenHelper {
        self.helper.as_ref()
    }

    fn write_top_level<'a>(
        &self,
        e: &mut CsEmitter<'a>,
        level: usize,
        top_level: &'a TopLevel,
    ) -> Result<(), CodegenError> {
        match top_level {
            TopLevel::Interface(interface) => self.write_interface(e, level, interface),
            TopLevel::Module(module) => self.write_module(e, level, module),
        }
    }

    fn write_module<'a>(
        &self,
        e: &mut CsEmitter<'a>,
        level: usize,
        module: &'a Module,
    ) -> Result<(), CodegenError> {
        e.document_item(level, Documented::Plain(&module.documentation), Place::Before);
        e.w.line(level, format!("namespace {}", module.name));
        e.w.line(level, "{");
        if !module.info.is_empty() {
            e.w.line(level + 1, "public static class _Info");
            e.w.line(level + 1, "{");
            for (key, value) in &module.info {
                e.w.line(
                    level + 2,
                    format!("public const string {} = {};", identifier(key), string_literal(value)),
                );
            }
            e.w.line(level + 1, "}");
        }
        for element in &module.elements {
            e.w.blank();
            self.write_top_level(e, level + 1, element)?;
        }
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }

    fn write_interface<'a>(
        &self,
        e: &mut CsEmitter<'a>,
        level: usize,
        interface: &'a Interface,
    ) -> Result<(), CodegenError> {
        log::trace!("C# interface '{}' ({:?})", interface.name, e.role());
        e.enter_interface(interface);
        let provider = DefinitionProvider::Interface(interface);
        let l = level + 1;

        e.document_item(level, Documented::Plain(&interface.documentation), Place::Before);
        e.w.line(level, format!("public abstract class {}", interface.name));
        e.w.line(level, "{");
        self.marshalling.write_members(e, l, provider)?;

        e.w.line(l, format!("protected {}()", interface.name));
        e.w.line(l, "{");
        self.marshalling.write_constructor_body(e, l + 1, provider)?;
        e.w.line(l, "}");
        e.w.blank();

        self.marshalling.write_object_interface(e, l)?;
        self.write_prebuilt_structures(e, l)?;
        self.write_definitions(e, l, provider)?;
        self.marshalling.write_invoke(e, l, provider)?;
        e.w.line(level, "}");
        e.w.blank();
        e.leave_interface();
        Ok(())
    }

    fn write_object<'a>(
        &self,
        e: &mut CsEmitter<'a>,
        level: usize,
        handle: &ObjectHandle,
    ) -> Result<(), CodegenError> {
        let object = e.document().object(handle);
        let provider = DefinitionProvider::Object(object);
        let interface = e.interface_name();
        let l = level + 1;

        e.document_item(level, Documented::Plain(&object.documentation), Place::Before);
        match e.role() {
            Role::Client => e.w.line(level, format!("public class {} : _IObject", object.name)),
            Role::Server => e.w.line(level, format!("public abstract class {} : _IObject", object.name)),
        }
        e.w.line(level, "{");
        e.w.line(l, format!("{interface} _intf;"));
        e.w.line(l, "public string _id { get; private set; }");
        self.marshalling.write_members(e, l, provider)?;

        let visibility = match e.role() {
            Role::Client => "public",
            Role::Server => "protected",
        };
        e.w.line(l, format!("{visibility} {}({interface} intf, string id)", object.name));
        e.w.line(l, "{");
        e.w.line(l + 1, "_intf = intf;");
        e.w.line(l + 1, "_id = id;");
        self.marshalling.write_constructor_body(e, l + 1, provider)?;
        e.w.line(l, "}");
        e.w.blank();

        if e.role() == Role::Client {
            e.w.line(l, format!("~{}()", object.name));
            e.w.line(l, "{");
            self.marshalling.write_destructor_body(e, l + 1, provider)?;
            e.w.line(l, "}");
            e.w.blank();
        }

        self.write_definitions(e, l, provider)?;
        self.marshalling.write_invoke(e, l, provider)?;
        e.w.line(level, "}");
        e.w.blank();
        Ok(())
    }

    fn struct_visibility(e: &CsEmitter<'_>) -> &'static str {
        match e.role() {
            Role::Client => "public",
            Role::Server => "protected",
        }
    }

    fn write_prebuilt_structures(&self, e: &mut CsEmitter<'_>, level: usize) -> Result<(), CodegenError> {
        let entries: Vec<_> = e.prebuilt().iter().cloned().collect();
        for entry in entries {
            if let Type::Structure(structure) = &*entry.ty {
                let visibility = Self::struct_visibility(e);
                e.w.line(level, format!("{visibility} struct _Prebuilt{}", entry.index));
                e.w.line(level, "{");
                self.write_members(e, level + 1, structure)?;
                e.w.line(level, "}");
                e.w.blank();
            }
        }
        Ok(())
    }

    fn write_members(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        structure: &Structure,
    ) -> Result<(), CodegenError> {
        for member in &structure.members {
            e.document_item(level, Documented::Plain(&member.documentation), Place::Before);
            let ty = e.type_name(&member.ty)?;
            e.w.line(level, format!("public {ty} {};", member.name));
        }
        Ok(())
    }

    fn write_definitions<'a>(
        &self,
        e: &mut CsEmitter<'a>,
        level: usize,
        provider: DefinitionProvider<'a>,
    ) -> Result<(), CodegenError> {
        for definition in provider.definitions() {
            match definition {
                Definition::TypeDefinition(td) => self.write_type_definition(e, level, td)?,
                Definition::Function(variant) | Definition::Method(variant) => {
                    self.write_function(e, level, provider, variant)?;
                }
                Definition::Property(property) => self.write_property(e, level, property)?,
                Definition::Object(handle) => self.write_object(e, level, handle)?,
            }
        }
        Ok(())
    }

    /// Only structures get a declaration; other aliases are spelled out
    /// at every use.
    fn write_type_definition(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        td: &TypeDefinition,
    ) -> Result<(), CodegenError> {
        if let Type::Structure(structure) = &*td.ty {
            e.document_item(level, Documented::Plain(&td.documentation), Place::Before);
            let visibility = Self::struct_visibility(e);
            e.w.line(level, format!("{visibility} struct {}", td.name));
            e.w.line(level, "{");
            self.write_members(e, level + 1, structure)?;
            e.w.line(level, "}");
            e.w.blank();
        } else {
            // spelled as the aliased type, but still reject what C# cannot express
            e.type_name(&td.ty)?;
        }
        Ok(())
    }

    fn write_function<'a>(
        &self,
        e: &mut CsEmitter<'a>,
        level: usize,
        provider: DefinitionProvider<'a>,
        variant: &FunctionVariant,
    ) -> Result<(), CodegenError> {
        let return_type = e.type_name(&variant.return_type)?;
        e.document_item(
            level,
            Documented::Function {
                documentation: &variant.documentation,
                arguments: &variant.arguments,
            },
            Place::Before,
        );
        e.w.indent(level);
        match e.role() {
            Role::Client => e.w.text("public "),
            Role::Server => e.w.text("protected abstract "),
        }
        e.w.text(format!("{return_type} {}(", variant.name));
        for (i, argument) in variant.arguments.iter().enumerate() {
            if i > 0 {
                e.w.text(", ");
            }
            let item = Documented::Argument {
                documentation: &argument.documentation,
                direction: argument.direction,
            };
            e.document_item(level, item, Place::Before);
            let ty = e.type_name(&argument.ty)?;
            let text = match argument.direction {
                Direction::In => format!("{ty} {}", argument.name),
                Direction::InOut => format!("ref {ty} {}", argument.name),
                Direction::Out => format!("out {ty} {}", argument.name),
            };
            e.w.text(text);
            e.document_item(level, item, Place::After);
        }
        e.w.text(")");

        match e.role() {
            Role::Client => {
                e.w.blank();
                e.w.line(level, "{");
                self.marshalling.write_function_body(e, level + 1, provider, variant)?;
                e.w.line(level, "}");
                e.w.blank();
            }
            Role::Server => e.w.text(";\n"),
        }
        Ok(())
    }

    fn write_property(
        &self,
        e: &mut CsEmitter<'_>,
        level: usize,
        property: &Property,
    ) -> Result<(), CodegenError> {
        let ty = e.type_name(&property.ty)?;
        e.document_item(level, Documented::Plain(&property.documentation), Place::Before);
        match e.role() {
            Role::Client => {
                e.w.line(level, format!("public {ty} {}", property.name));
                e.w.line(level, "{");
                e.w.line(level + 1, "get");
                e.w.line(level + 1, "{");
                self.marshalling.write_property_getter_body(e, level + 2, property)?;
                e.w.line(level + 1, "}");
                if !property.readonly {
                    e.w.line(level + 1, "set");
                    e.w.line(level + 1, "{");
                    self.marshalling.write_property_setter_body(e, level + 2, property)?;
                    e.w.line(level + 1, "}");
                }
                e.w.line(level, "}");
                e.w.blank();
            }
            Role::Server => {
                let accessors = if property.readonly { "get;" } else { "get; set;" };
                e.w.line(
                    level,
                    format!("protected abstract {ty} {} {{ {accessors} }}", property.name),
                );
            }
        }
        Ok(())
    }
}

impl<M: CsMarshalling> CodeGen for CsCodeGen<M> {
    fn generate(&self, document: &Document, ctx: EmissionContext) -> Result<String, CodegenError> {
        if ctx.mode != Mode::AllInOne {
            log::debug!("C# has no declaration/implementation split, rendering the whole file for {ctx}");
        }
        log::debug!("generating C# code ({ctx})");
        let mut e = CsEmitter::new(document, ctx, self.helper.as_ref());
        self.marshalling.write_usings(&mut e)?;
        e.w.blank();

        let mut level = 0;
        let namespace = self.helper.namespace();
        if let Some(namespace) = namespace {
            e.w.line(0, format!("namespace {namespace}"));
            e.w.line(0, "{");
            level = 1;
        }
        for top_level in document.top_levels() {
            self.write_top_level(&mut e, level, top_level)?;
        }
        if namespace.is_some() {
            e.w.line(0, "}");
        }
        Ok(e.w.into_string())
    }
}
