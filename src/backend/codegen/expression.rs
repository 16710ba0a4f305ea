use super::{Generator, call::Argument, statement::Context};
use crate::{
    backend::{
        CodegenError, CodegenResult,
        isa::{Address, Operator, Register},
        program::LabelId,
    },
    frontend::{
        ast::{
            BinaryOperatorKind, ClassDefinition, Expression, ExpressionKind, Literal, NodeId,
            UnaryOperatorKind,
        },
        intern::Symbol,
    },
    middle::{
        scope::{ScopeId, ScopeKind},
        type_check::THIS,
    },
};

/// Storage a name, field or element refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Place {
    /// Slot of the active frame in private memory
    Local(u32),
    /// Fixed shared memory address
    Global(u32),
    /// Shared memory address computed into a register the place owns
    Shared(Register),
}

impl Place {
    /// Shared memory address of the place, used for locks
    pub(super) fn address(self) -> CodegenResult<Address> {
        match self {
            Self::Local(_) => Err(CodegenError::NotAddressable("a local variable")),
            Self::Global(address) => Ok(Address::Direct(address)),
            Self::Shared(register) => Ok(Address::Indirect(register)),
        }
    }
}

fn operator(operator: BinaryOperatorKind) -> Operator {
    match operator {
        BinaryOperatorKind::Add => Operator::Add,
        BinaryOperatorKind::Subtract => Operator::Sub,
        BinaryOperatorKind::Multiply => Operator::Mul,
        BinaryOperatorKind::Divide => Operator::Div,
        BinaryOperatorKind::Modulus => Operator::Mod,
        BinaryOperatorKind::Equals => Operator::Equal,
        BinaryOperatorKind::NotEquals => Operator::NEq,
        BinaryOperatorKind::LessThan => Operator::Lt,
        BinaryOperatorKind::LessThanOrEqualTo => Operator::LtE,
        BinaryOperatorKind::GreaterThan => Operator::Gt,
        BinaryOperatorKind::GreaterThanOrEqualTo => Operator::GtE,
        BinaryOperatorKind::And => Operator::And,
        BinaryOperatorKind::Or => Operator::Or,
        BinaryOperatorKind::Xor => Operator::Xor,
    }
}

impl Generator<'_> {
    /// Evaluates `expression` into a freshly allocated register owned by the
    /// caller.
    pub(super) fn gen_expression(
        &mut self,
        expression: &Expression,
        context: Context,
    ) -> CodegenResult<Register> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => match literal {
                Literal::Int(value) => self.gen_constant(*value),
                Literal::Bool(value) => self.gen_constant(*value as i32),
                Literal::Char(value) => self.gen_constant(*value as i32),
                Literal::String(value) => self.gen_string(value),
            },
            ExpressionKind::Identifier(name) => {
                let first = self.program.next_instruction();
                let place = self.place_of_name(expression.id, *name, context)?;
                let register = self.load_place(place)?;

                self.comment(first, || format!("load {name}"));

                Ok(register)
            }
            ExpressionKind::EnumValue {
                enumeration,
                member,
            } => {
                let ty = self
                    .checked
                    .types
                    .lookup_enum(*enumeration)
                    .ok_or(CodegenError::MissingAnnotation("enum"))?;

                self.gen_constant(ty.ordinal(*member))
            }
            ExpressionKind::ArrayLiteral(elements) => self.gen_array_literal(elements, context),
            ExpressionKind::NewArray { length, .. } => {
                let length = self.gen_expression(length, context)?;

                self.gen_alloc(length)
            }
            ExpressionKind::Index { array, index } => {
                let place = self.place_of_element(array, index, context)?;

                self.load_place(place)
            }
            ExpressionKind::Field { object, field } => {
                let place = self.place_of_field(object, *field, context)?;

                self.load_place(place)
            }
            ExpressionKind::Call {
                function,
                arguments,
            } => {
                let id = self
                    .checked
                    .functions
                    .lookup(expression.id)
                    .ok_or(CodegenError::MissingAnnotation("call target"))?;

                if self.checked.functions.get(id).is_thread {
                    return self.gen_launch(id, *function);
                }

                let arguments = arguments.iter().map(Argument::Expression).collect();
                self.gen_function_call(id, arguments, context)
            }
            ExpressionKind::MethodCall {
                receiver,
                arguments,
                ..
            } => {
                let id = self
                    .checked
                    .functions
                    .lookup(expression.id)
                    .ok_or(CodegenError::MissingAnnotation("method call target"))?;

                let arguments = std::iter::once(receiver.as_ref())
                    .chain(arguments)
                    .map(Argument::Expression)
                    .collect();
                self.gen_function_call(id, arguments, context)
            }
            ExpressionKind::New { class, arguments } => {
                self.gen_new(expression, *class, arguments, context)
            }
            ExpressionKind::Unary { operator, operand } => {
                let register = self.gen_expression(operand, context)?;
                let operator = match operator {
                    UnaryOperatorKind::Not => Operator::Equal,
                    UnaryOperatorKind::Negate => Operator::Sub,
                };

                self.compute(operator, Register::Zero, register, register)?;
                Ok(register)
            }
            // both operands are always evaluated, `and` and `or` included
            ExpressionKind::Binary {
                operator: op,
                left,
                right,
            } => {
                let left = self.gen_expression(left, context)?;
                let right = self.gen_expression(right, context)?;

                self.compute(operator(*op), left, right, right)?;
                self.registers.free(left)?;

                Ok(right)
            }
        }
    }

    pub(super) fn gen_constant(&mut self, value: i32) -> CodegenResult<Register> {
        let register = self.registers.allocate()?;
        self.constant(value, register)?;

        Ok(register)
    }

    /// Strings are char arrays with a trailing zero
    fn gen_string(&mut self, value: &str) -> CodegenResult<Register> {
        let length = value.chars().count() as i32;
        let size = self.gen_constant(length + 1)?;
        let first = self.program.next_instruction();
        let pointer = self.gen_alloc(size)?;

        self.comment(first, || format!("allocate {value:?}"));

        for (index, char) in value.chars().enumerate() {
            let register = self.gen_constant(char as i32)?;
            self.write_element(pointer, index as i32, register)?;
            self.registers.free(register)?;
        }

        self.write_element(pointer, length, Register::Zero)?;

        Ok(pointer)
    }

    fn gen_array_literal(
        &mut self,
        elements: &[Expression],
        context: Context,
    ) -> CodegenResult<Register> {
        let size = self.gen_constant(elements.len() as i32)?;
        let pointer = self.gen_alloc(size)?;

        for (index, element) in elements.iter().enumerate() {
            let register = self.gen_expression(element, context)?;
            self.write_element(pointer, index as i32, register)?;
            self.registers.free(register)?;
        }

        Ok(pointer)
    }

    /// Allocates the object, runs the field initializers and then the
    /// constructor bound to the expression, if any.
    fn gen_new(
        &mut self,
        expression: &Expression,
        class: Symbol,
        arguments: &[Expression],
        context: Context,
    ) -> CodegenResult<Register> {
        let scope = self.class_scope(class)?;
        let size = self.checked.scopes.frame_size(scope);

        let first = self.program.next_instruction();
        let size = self.gen_constant(size as i32)?;
        let pointer = self.gen_alloc(size)?;
        self.comment(first, || format!("new {class}"));

        if let Some(&entry) = self.initializers.get(&class) {
            self.gen_initialize(entry, pointer)?;
        }

        if let Some(constructor) = self.checked.functions.lookup(expression.id) {
            let arguments = std::iter::once(Argument::Shared(pointer))
                .chain(arguments.iter().map(Argument::Expression))
                .collect();
            let result = self.gen_function_call(constructor, arguments, context)?;
            self.registers.free(result)?;
        }

        Ok(pointer)
    }

    /// Routine storing the initial value of every initialized field of
    /// `definition` into the object passed as its only argument. Initializers
    /// are evaluated in the global context.
    pub(super) fn gen_field_initializers(
        &mut self,
        definition: &ClassDefinition,
        entry: LabelId,
    ) -> CodegenResult<()> {
        debug_assert!(self.registers.all_free());

        let scope = self.class_scope(definition.name)?;
        let first = self.program.next_instruction();

        for field in &definition.fields {
            let Some(initializer) = &field.initializer else {
                continue;
            };

            let offset = self
                .checked
                .scopes
                .offset_of(scope, field.name)
                .ok_or(CodegenError::MissingAnnotation("field offset"))?;
            let value = self.gen_expression(initializer, Context::default())?;
            let object = self.load_place(Place::Local(0))?;

            self.write_element(object, offset as i32, value)?;
            self.registers.free(object)?;
            self.registers.free(value)?;
        }

        self.emit_return(None)?;
        self.program.bind(entry, first)?;

        let name = definition.name;
        self.comment(first, || format!("initialize fields of {name}"));

        Ok(())
    }

    fn class_scope(&self, class: Symbol) -> CodegenResult<ScopeId> {
        self.checked
            .types
            .lookup_class(class)
            .ok_or(CodegenError::MissingAnnotation("class"))?
            .scope()
            .ok_or(CodegenError::MissingAnnotation("class scope"))
    }

    /// Stores `value` at `pointer + index` in shared memory
    fn write_element(&mut self, pointer: Register, index: i32, value: Register) -> CodegenResult<()> {
        let address = self.registers.allocate()?;

        self.constant(index, address)?;
        self.compute(Operator::Add, pointer, address, address)?;
        self.write(value, Address::Indirect(address))?;

        self.registers.free(address)
    }

    /* Places */

    pub(super) fn place_of_expression(
        &mut self,
        expression: &Expression,
        context: Context,
    ) -> CodegenResult<Place> {
        match &expression.kind {
            ExpressionKind::Identifier(name) => self.place_of_name(expression.id, *name, context),
            ExpressionKind::Index { array, index } => {
                self.place_of_element(array, index, context)
            }
            ExpressionKind::Field { object, field } => {
                self.place_of_field(object, *field, context)
            }
            _ => Err(CodegenError::NotAddressable("a computed value")),
        }
    }

    /// Storage of the variable `name` used or declared at `node`
    pub(super) fn place_of_name(
        &mut self,
        node: NodeId,
        name: Symbol,
        context: Context,
    ) -> CodegenResult<Place> {
        let scopes = &self.checked.scopes;
        let scope = self
            .checked
            .annotations
            .scope_of(node)
            .ok_or(CodegenError::MissingAnnotation("scope"))?;
        let offset = scopes
            .offset_of(scope, name)
            .ok_or(CodegenError::MissingAnnotation("storage offset"))?;

        match scopes.kind(scope) {
            ScopeKind::Global => Ok(Place::Global(self.layout.global(offset))),
            // a bare field name inside a method reads through `this`
            ScopeKind::Class => {
                let this = context
                    .function
                    .and_then(|function| scopes.offset_of(function, Symbol::new(THIS)))
                    .ok_or(CodegenError::MissingAnnotation("receiver"))?;
                let object = self.load_place(Place::Local(this))?;

                self.field_address(object, offset)
            }
            ScopeKind::Function | ScopeKind::Block => Ok(Place::Local(offset)),
        }
    }

    pub(super) fn place_of_field(
        &mut self,
        object: &Expression,
        field: Symbol,
        context: Context,
    ) -> CodegenResult<Place> {
        let offset = self
            .checked
            .annotations
            .type_of(object.id)
            .and_then(|ty| ty.as_class())
            .and_then(|class| class.scope())
            .and_then(|scope| self.checked.scopes.offset_of(scope, field))
            .ok_or(CodegenError::MissingAnnotation("field offset"))?;
        let object = self.gen_expression(object, context)?;

        self.field_address(object, offset)
    }

    fn field_address(&mut self, object: Register, offset: u32) -> CodegenResult<Place> {
        if offset != 0 {
            let register = self.registers.allocate()?;

            self.constant(offset as i32, register)?;
            self.compute(Operator::Add, object, register, object)?;
            self.registers.free(register)?;
        }

        Ok(Place::Shared(object))
    }

    /// Every element takes one word so the element address is `base + index`
    pub(super) fn place_of_element(
        &mut self,
        array: &Expression,
        index: &Expression,
        context: Context,
    ) -> CodegenResult<Place> {
        let array = self.gen_expression(array, context)?;
        let index = self.gen_expression(index, context)?;

        self.compute(Operator::Add, array, index, index)?;
        self.registers.free(array)?;

        Ok(Place::Shared(index))
    }

    /// Reads the value stored at `place`, consuming the place
    pub(super) fn load_place(&mut self, place: Place) -> CodegenResult<Register> {
        match place {
            Place::Local(offset) => {
                let register = self.registers.allocate()?;

                self.constant(offset as i32 + 1, register)?;
                self.compute(Operator::Add, Register::ARP, register, register)?;
                self.load(Address::Indirect(register), register)?;

                Ok(register)
            }
            Place::Global(address) => {
                let register = self.registers.allocate()?;

                self.read(Address::Direct(address))?;
                self.receive(register)?;

                Ok(register)
            }
            Place::Shared(address) => {
                self.read(Address::Indirect(address))?;
                self.receive(address)?;

                Ok(address)
            }
        }
    }

    /// Writes `value` to `place`, consuming the place but not the value
    pub(super) fn store_place(&mut self, value: Register, place: Place) -> CodegenResult<()> {
        match place {
            Place::Local(offset) => {
                let register = self.registers.allocate()?;

                self.constant(offset as i32 + 1, register)?;
                self.compute(Operator::Add, Register::ARP, register, register)?;
                self.store(value, Address::Indirect(register))?;

                self.registers.free(register)
            }
            Place::Global(address) => {
                self.write(value, Address::Direct(address))?;

                Ok(())
            }
            Place::Shared(address) => {
                self.write(value, Address::Indirect(address))?;

                self.registers.free(address)
            }
        }
    }
}
