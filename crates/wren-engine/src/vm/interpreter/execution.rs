//! The dispatch loop

use super::call::Dispatch;
use crate::compiler::Opcode;
use crate::vm::fiber::FiberState;
use crate::vm::object::{Obj, ObjClosure, ObjInstance, ObjRef};
use crate::vm::value::Value;
use crate::vm::{Vm, VmResult};

impl Vm {
    /// Run `fiber` as a root fiber until it returns, suspends, or fails with
    /// an error nothing catches.
    ///
    /// Returns the value the outermost function returned, or null when the
    /// VM was suspended.
    pub(crate) fn run_interpreter(&mut self, fiber: ObjRef) -> VmResult<Value> {
        let mut fiber = fiber;
        self.fiber = Some(fiber);
        self.heap.fiber_mut(fiber).state = FiberState::Root;
        let mut frame = self.load_frame(fiber);

        // Abort the running fiber with an error value and resume wherever
        // the error is caught.
        macro_rules! throw {
            ($error:expr) => {{
                let error = $error;
                self.store_frame(fiber, &frame);
                fiber = self.runtime_error(error)?;
                frame = self.load_frame(fiber);
                continue;
            }};
        }

        macro_rules! fail {
            ($($arg:tt)*) => {{
                let message = format!($($arg)*);
                throw!(self.error_value(&message))
            }};
        }

        loop {
            let byte = frame.read_byte();
            let Some(op) = Opcode::from_u8(byte) else {
                panic!("invalid opcode {:#04x} at {}", byte, frame.ip - 1);
            };

            match op {
                Opcode::Constant => {
                    let index = frame.read_short();
                    let value = self.heap.func(frame.function).constants[index];
                    self.heap.fiber_mut(fiber).push(value);
                }
                Opcode::Null => self.heap.fiber_mut(fiber).push(Value::NULL),
                Opcode::False => self.heap.fiber_mut(fiber).push(Value::FALSE),
                Opcode::True => self.heap.fiber_mut(fiber).push(Value::TRUE),
                Opcode::Pop => {
                    self.heap.fiber_mut(fiber).pop();
                }

                Opcode::LoadLocal0
                | Opcode::LoadLocal1
                | Opcode::LoadLocal2
                | Opcode::LoadLocal3
                | Opcode::LoadLocal4
                | Opcode::LoadLocal5
                | Opcode::LoadLocal6
                | Opcode::LoadLocal7
                | Opcode::LoadLocal8 => {
                    let slot = (byte - Opcode::LoadLocal0.to_u8()) as usize;
                    let f = self.heap.fiber_mut(fiber);
                    let value = f.stack[frame.stack_start + slot];
                    f.push(value);
                }
                Opcode::LoadLocal => {
                    let slot = frame.read_byte() as usize;
                    let f = self.heap.fiber_mut(fiber);
                    let value = f.stack[frame.stack_start + slot];
                    f.push(value);
                }
                Opcode::StoreLocal => {
                    let slot = frame.read_byte() as usize;
                    let f = self.heap.fiber_mut(fiber);
                    let value = f.peek(0);
                    f.stack[frame.stack_start + slot] = value;
                }
                Opcode::LoadUpvalue => {
                    let index = frame.read_byte() as usize;
                    let upvalue = self.heap.closure(frame.closure).upvalues[index];
                    let value = self.upvalue_get(upvalue);
                    self.heap.fiber_mut(fiber).push(value);
                }
                Opcode::StoreUpvalue => {
                    let index = frame.read_byte() as usize;
                    let upvalue = self.heap.closure(frame.closure).upvalues[index];
                    let value = self.heap.fiber(fiber).peek(0);
                    self.upvalue_set(upvalue, value);
                }
                Opcode::CloseUpvalue => {
                    let top = self.heap.fiber(fiber).stack.len() - 1;
                    self.close_upvalues(fiber, top);
                    self.heap.fiber_mut(fiber).pop();
                }

                Opcode::LoadModuleVar => {
                    let symbol = frame.read_short();
                    let module = self.heap.func(frame.function).module;
                    let value = self.heap.module(module).variables[symbol];
                    self.heap.fiber_mut(fiber).push(value);
                }
                Opcode::StoreModuleVar => {
                    let symbol = frame.read_short();
                    let module = self.heap.func(frame.function).module;
                    let value = self.heap.fiber(fiber).peek(0);
                    self.heap.module_mut(module).variables[symbol] = value;
                }
                Opcode::LoadFieldThis => {
                    let field = frame.field_base + frame.read_byte() as usize;
                    let receiver = self.heap.fiber(fiber).stack[frame.stack_start];
                    let Some(instance) = self.heap.try_instance(receiver) else {
                        fail!("Only instances have fields.");
                    };
                    let value = instance.fields[field];
                    self.heap.fiber_mut(fiber).push(value);
                }
                Opcode::StoreFieldThis => {
                    let field = frame.field_base + frame.read_byte() as usize;
                    let receiver = self.heap.fiber(fiber).stack[frame.stack_start];
                    let value = self.heap.fiber(fiber).peek(0);
                    if self.heap.try_instance(receiver).is_none() {
                        fail!("Only instances have fields.");
                    }
                    self.heap.instance_mut(receiver.as_obj()).fields[field] = value;
                }
                Opcode::LoadField => {
                    let field = frame.field_base + frame.read_byte() as usize;
                    let receiver = self.heap.fiber(fiber).peek(0);
                    let Some(instance) = self.heap.try_instance(receiver) else {
                        fail!("Only instances have fields.");
                    };
                    let value = instance.fields[field];
                    self.heap.fiber_mut(fiber).set_top(value);
                }
                Opcode::StoreField => {
                    let field = frame.field_base + frame.read_byte() as usize;
                    let receiver = self.heap.fiber_mut(fiber).pop();
                    let value = self.heap.fiber(fiber).peek(0);
                    if self.heap.try_instance(receiver).is_none() {
                        fail!("Only instances have fields.");
                    }
                    self.heap.instance_mut(receiver.as_obj()).fields[field] = value;
                }

                Opcode::Call | Opcode::Super => {
                    let argc = frame.read_byte() as usize;
                    let symbol = frame.read_short();

                    let class = if op == Opcode::Call {
                        let receiver = self.heap.fiber(fiber).peek(argc);
                        self.class_of(receiver)
                    } else {
                        let owner = self.heap.closure(frame.closure).owner;
                        match owner.and_then(|owner| self.heap.class(owner).superclass) {
                            Some(superclass) => superclass,
                            None => fail!("Cannot use 'super' outside of a method."),
                        }
                    };

                    self.store_frame(fiber, &frame);
                    match self.invoke(fiber, class, symbol, argc) {
                        Dispatch::Done => {}
                        Dispatch::Entered => frame = self.load_frame(fiber),
                        Dispatch::Switched => {
                            let Some(next) = self.fiber else {
                                // Suspended with nothing to return to.
                                return Ok(Value::NULL);
                            };
                            fiber = next;
                            let error = self.heap.fiber(fiber).error;
                            if !error.is_null() {
                                throw!(error);
                            }
                            frame = self.load_frame(fiber);
                        }
                        Dispatch::Error(error) => throw!(error),
                    }
                }

                Opcode::Jump => {
                    let offset = frame.read_short();
                    frame.ip += offset;
                }
                Opcode::Loop => {
                    let offset = frame.read_short();
                    frame.ip -= offset;
                }
                Opcode::JumpIf => {
                    let offset = frame.read_short();
                    if self.heap.fiber_mut(fiber).pop().is_falsy() {
                        frame.ip += offset;
                    }
                }
                Opcode::And => {
                    let offset = frame.read_short();
                    if self.heap.fiber(fiber).peek(0).is_falsy() {
                        frame.ip += offset;
                    } else {
                        self.heap.fiber_mut(fiber).pop();
                    }
                }
                Opcode::Or => {
                    let offset = frame.read_short();
                    if self.heap.fiber(fiber).peek(0).is_falsy() {
                        self.heap.fiber_mut(fiber).pop();
                    } else {
                        frame.ip += offset;
                    }
                }

                Opcode::Return => {
                    let result = self.heap.fiber_mut(fiber).pop();
                    self.close_upvalues(fiber, frame.stack_start);

                    let f = self.heap.fiber_mut(fiber);
                    f.frames.pop();

                    if f.frames.is_empty() {
                        f.stack.clear();
                        f.stack.push(result);

                        let Some(caller) = f.caller.take() else {
                            return Ok(result);
                        };
                        log::trace!("fiber {:?} finished, resuming {:?}", fiber, caller);
                        fiber = caller;
                        self.fiber = Some(fiber);
                        self.heap.fiber_mut(fiber).set_top(result);
                    } else {
                        // The result replaces the receiver slot, which the
                        // returning function may already have popped.
                        f.stack.truncate(frame.stack_start);
                        f.stack.push(result);
                    }
                    frame = self.load_frame(fiber);
                }

                Opcode::Closure => {
                    let index = frame.read_short();
                    let function = self.heap.func(frame.function).constants[index].as_obj();
                    let num_upvalues = self.heap.func(function).num_upvalues;
                    let owner = self.heap.closure(frame.closure).owner;

                    let closure = self.allocate(
                        None,
                        Obj::Closure(ObjClosure {
                            function,
                            upvalues: Vec::with_capacity(num_upvalues),
                            owner,
                        }),
                    );
                    // On the stack before capturing, which may collect.
                    self.heap.fiber_mut(fiber).push(Value::from(closure));

                    for _ in 0..num_upvalues {
                        let is_local = frame.read_byte() != 0;
                        let index = frame.read_byte() as usize;
                        let upvalue = if is_local {
                            self.capture_upvalue(fiber, frame.stack_start + index)
                        } else {
                            self.heap.closure(frame.closure).upvalues[index]
                        };
                        self.heap.closure_mut(closure).upvalues.push(upvalue);
                    }
                }
                Opcode::Construct => {
                    let class = self.heap.fiber(fiber).stack[frame.stack_start].as_obj();
                    let num_fields = self.heap.class(class).num_fields;
                    let instance = self.allocate(
                        Some(class),
                        Obj::Instance(ObjInstance {
                            fields: vec![Value::NULL; num_fields].into_boxed_slice(),
                        }),
                    );
                    self.heap.fiber_mut(fiber).stack[frame.stack_start] = Value::from(instance);
                }
                Opcode::ForeignConstruct => {
                    self.store_frame(fiber, &frame);
                    if let Err(error) = self.foreign_construct(fiber, frame.stack_start) {
                        throw!(error);
                    }
                }
                Opcode::Class => {
                    let num_fields = frame.read_byte() as usize;
                    if let Err(error) = self.create_class(fiber, Some(num_fields)) {
                        throw!(error);
                    }
                }
                Opcode::ForeignClass => {
                    self.store_frame(fiber, &frame);
                    if let Err(error) = self.create_class(fiber, None) {
                        throw!(error);
                    }
                }
                Opcode::EndClass => {
                    let f = self.heap.fiber_mut(fiber);
                    let class = f.pop().as_obj();
                    let attributes = f.pop();
                    self.heap.class_mut(class).attributes = attributes;
                }
                Opcode::MethodInstance | Opcode::MethodStatic => {
                    let symbol = frame.read_short();
                    self.store_frame(fiber, &frame);
                    if let Err(error) = self.define_method(fiber, symbol, op == Opcode::MethodStatic) {
                        throw!(error);
                    }
                }

                Opcode::EndModule => {
                    self.last_module = Some(self.heap.func(frame.function).module);
                    self.heap.fiber_mut(fiber).push(Value::NULL);
                }
                Opcode::ImportModule => {
                    let index = frame.read_short();
                    let name = self.heap.func(frame.function).constants[index];
                    self.store_frame(fiber, &frame);

                    let imported = match self.import_module(fiber, name) {
                        Ok(imported) => imported,
                        Err(error) => throw!(error),
                    };
                    self.heap.fiber_mut(fiber).push(imported);

                    if self.heap.try_closure(imported).is_some() {
                        // Run the module body; its result lands in this slot.
                        let args_start = self.heap.fiber(fiber).stack.len() - 1;
                        if let Err(error) = self.call_closure(fiber, imported.as_obj(), args_start) {
                            throw!(error);
                        }
                        frame = self.load_frame(fiber);
                    } else {
                        self.last_module = Some(imported.as_obj());
                    }
                }
                Opcode::ImportVariable => {
                    let index = frame.read_short();
                    let name = self.heap.func(frame.function).constants[index];
                    match self.import_variable(name) {
                        Ok(value) => self.heap.fiber_mut(fiber).push(value),
                        Err(error) => throw!(error),
                    }
                }

                Opcode::End => panic!("ran off the end of function {:?}", frame.function),
            }
        }
    }
}
