//! Host API
//!
//! Host code exchanges values with scripts through a window of numbered
//! *slots*. Inside a foreign method slot 0 is the receiver and slots 1..n
//! the arguments; whatever is left in slot 0 is returned. Outside a foreign
//! call the first slot access creates a scratch fiber to hold the window.
//!
//! Values read out of slots are only safe from collection while they stay
//! in a slot. Keep them longer with a [`Handle`].

use std::rc::Rc;

use crate::compiler::Opcode;
use crate::vm::gc::Handle;
use crate::vm::object::{FnDebug, Obj, ObjClosure, ObjFn, ObjForeign, ObjKind, ObjList, ObjRef};
use crate::vm::value::Value;
use crate::vm::{Vm, VmError, VmResult};

/// Window of a fiber's stack exposed through the slot API
#[derive(Debug, Clone, Copy)]
pub(crate) struct ApiStack {
    pub fiber: ObjRef,
    /// Stack index of slot 0
    pub start: usize,
}

/// Type of the value in a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotType {
    /// `true` or `false`
    Bool,
    /// Number
    Num,
    /// Instance of a foreign class
    Foreign,
    /// List
    List,
    /// Map
    Map,
    /// `null`
    Null,
    /// String
    String,
    /// Any other object
    Unknown,
}

impl Vm {
    /// The slot window, creating a scratch one if no call is in progress
    fn api_window(&mut self) -> ApiStack {
        if let Some(api) = self.api_stack {
            return api;
        }
        let fiber = self.new_fiber(None);
        let api = ApiStack { fiber, start: 0 };
        self.api_stack = Some(api);
        api
    }

    fn slot_index(&mut self, slot: usize) -> (ObjRef, usize) {
        let api = self.api_window();
        let index = api.start + slot;
        assert!(
            index < self.heap.fiber(api.fiber).stack.len(),
            "slot {} out of range ({} slots)",
            slot,
            self.slot_count()
        );
        (api.fiber, index)
    }

    // ========================================================================
    // Slots
    // ========================================================================

    /// Number of slots in the window
    pub fn slot_count(&self) -> usize {
        match self.api_stack {
            Some(api) => self.heap.fiber(api.fiber).stack.len() - api.start,
            None => 0,
        }
    }

    /// Grow the window to at least `count` slots; new slots hold null
    pub fn ensure_slots(&mut self, count: usize) {
        let api = self.api_window();
        let needed = api.start + count;
        let f = self.heap.fiber_mut(api.fiber);
        if f.stack.len() >= needed {
            return;
        }
        let grown = f.ensure_stack(needed - f.stack.len());
        f.stack.resize(needed, Value::NULL);
        self.heap.track_bytes(grown);
    }

    /// Value in `slot`
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside the window.
    pub fn get_slot(&mut self, slot: usize) -> Value {
        let (fiber, index) = self.slot_index(slot);
        self.heap.fiber(fiber).stack[index]
    }

    /// Store `value` in `slot`
    ///
    /// # Panics
    ///
    /// Panics if `slot` is outside the window.
    pub fn set_slot(&mut self, slot: usize, value: Value) {
        let (fiber, index) = self.slot_index(slot);
        self.heap.fiber_mut(fiber).stack[index] = value;
    }

    /// Type of the value in `slot`
    pub fn slot_type(&mut self, slot: usize) -> SlotType {
        let value = self.get_slot(slot);
        if value.is_bool() {
            return SlotType::Bool;
        }
        if value.is_num() {
            return SlotType::Num;
        }
        if value.is_null() {
            return SlotType::Null;
        }
        match self.heap.kind_of(value) {
            Some(ObjKind::Foreign) => SlotType::Foreign,
            Some(ObjKind::List) => SlotType::List,
            Some(ObjKind::Map) => SlotType::Map,
            Some(ObjKind::String) => SlotType::String,
            _ => SlotType::Unknown,
        }
    }

    /// Boolean in `slot`, if it holds one
    pub fn get_slot_bool(&mut self, slot: usize) -> Option<bool> {
        let value = self.get_slot(slot);
        value.is_bool().then(|| value.as_bool())
    }

    /// Number in `slot`, if it holds one
    pub fn get_slot_num(&mut self, slot: usize) -> Option<f64> {
        self.get_slot(slot).try_num()
    }

    /// Text of the string in `slot`, if it holds one
    pub fn get_slot_string(&mut self, slot: usize) -> Option<String> {
        let value = self.get_slot(slot);
        self.heap
            .try_string(value)
            .map(|s| s.to_str_lossy().into_owned())
    }

    /// Raw bytes of the string in `slot`, if it holds one
    pub fn get_slot_bytes(&mut self, slot: usize) -> Option<Vec<u8>> {
        let value = self.get_slot(slot);
        self.heap.try_string(value).map(|s| s.as_bytes().to_vec())
    }

    /// Store a boolean
    pub fn set_slot_bool(&mut self, slot: usize, value: bool) {
        self.set_slot(slot, Value::bool(value));
    }

    /// Store a number
    pub fn set_slot_num(&mut self, slot: usize, value: f64) {
        self.set_slot(slot, Value::num(value));
    }

    /// Store null
    pub fn set_slot_null(&mut self, slot: usize) {
        self.set_slot(slot, Value::NULL);
    }

    /// Store a new string
    pub fn set_slot_string(&mut self, slot: usize, text: &str) {
        self.set_slot_bytes(slot, text.as_bytes());
    }

    /// Store a new string made of arbitrary bytes
    pub fn set_slot_bytes(&mut self, slot: usize, bytes: &[u8]) {
        let string = self.new_string_obj(bytes);
        self.set_slot(slot, Value::from(string));
    }

    /// Store a new empty list
    pub fn set_slot_new_list(&mut self, slot: usize) {
        let list = self.new_list(Vec::new());
        self.set_slot(slot, list);
    }

    /// Store a new empty map
    pub fn set_slot_new_map(&mut self, slot: usize) {
        let map = self.new_map();
        self.set_slot(slot, map);
    }

    /// Store a new instance of the foreign class in `class_slot`, with
    /// `size` zeroed bytes of host data
    ///
    /// # Panics
    ///
    /// Panics if `class_slot` does not hold a foreign class.
    pub fn set_slot_new_foreign(&mut self, slot: usize, class_slot: usize, size: usize) {
        let class = self.get_slot(class_slot);
        let class = match self.heap.try_class(class) {
            Some(c) if c.is_foreign => class.as_obj(),
            _ => panic!("slot {} does not hold a foreign class", class_slot),
        };

        let foreign = self.allocate(
            Some(class),
            Obj::Foreign(ObjForeign {
                data: vec![0; size].into_boxed_slice(),
            }),
        );
        self.set_slot(slot, Value::from(foreign));
    }

    /// Host data of the foreign object in `slot`, if it holds one
    pub fn foreign_data_mut(&mut self, slot: usize) -> Option<&mut [u8]> {
        let value = self.get_slot(slot);
        self.heap.try_foreign(value)?;
        Some(&mut self.heap.foreign_mut(value.as_obj()).data)
    }

    /// Number of elements of the list in `slot`
    pub fn list_count(&mut self, slot: usize) -> Option<usize> {
        let value = self.get_slot(slot);
        self.heap.try_list(value).map(|list| list.elements.len())
    }

    /// Append the value in `element_slot` to the list in `list_slot`.
    /// Returns `false` if `list_slot` does not hold a list.
    pub fn list_push(&mut self, list_slot: usize, element_slot: usize) -> bool {
        let list = self.get_slot(list_slot);
        let element = self.get_slot(element_slot);
        if self.heap.try_list(list).is_none() {
            return false;
        }
        self.heap.list_mut(list.as_obj()).elements.push(element);
        true
    }

    /// Copy element `index` of the list in `list_slot` into `element_slot`.
    /// Negative indices count from the end.
    pub fn get_list_element(&mut self, list_slot: usize, index: i64, element_slot: usize) -> bool {
        let list = self.get_slot(list_slot);
        let Some(elements) = self.heap.try_list(list).map(|l| &l.elements) else {
            return false;
        };
        let count = elements.len() as i64;
        let index = if index < 0 { count + index } else { index };
        if index < 0 || index >= count {
            return false;
        }
        let element = elements[index as usize];
        self.set_slot(element_slot, element);
        true
    }

    /// Copy the value of `key_slot` in the map in `map_slot` into
    /// `value_slot`. Returns `false` if the key is missing.
    pub fn get_map_value(&mut self, map_slot: usize, key_slot: usize, value_slot: usize) -> bool {
        let map = self.get_slot(map_slot);
        let key = self.get_slot(key_slot);
        if self.heap.try_map(map).is_none() || !self.heap.is_valid_key(key) {
            return false;
        }
        match self.heap.map_get(map.as_obj(), key) {
            Some(value) => {
                self.set_slot(value_slot, value);
                true
            }
            None => false,
        }
    }

    /// Set `key_slot` to `value_slot` in the map in `map_slot`
    pub fn set_map_value(&mut self, map_slot: usize, key_slot: usize, value_slot: usize) -> bool {
        let map = self.get_slot(map_slot);
        let key = self.get_slot(key_slot);
        let value = self.get_slot(value_slot);
        if self.heap.try_map(map).is_none() || !self.heap.is_valid_key(key) {
            return false;
        }
        self.heap.map_set(map.as_obj(), key, value);
        true
    }

    /// Load a module's top-level variable into `slot`
    pub fn get_variable_into_slot(&mut self, module: &str, name: &str, slot: usize) -> bool {
        match self.get_variable(module, name) {
            Some(value) => {
                self.set_slot(slot, value);
                true
            }
            None => false,
        }
    }

    /// Abort the running fiber with the value in `slot` as its error.
    ///
    /// Takes effect when the foreign method returns.
    pub fn abort_fiber(&mut self, slot: usize) {
        let error = self.get_slot(slot);
        if let Some(fiber) = self.fiber {
            self.heap.fiber_mut(fiber).error = error;
        }
    }

    // ========================================================================
    // Handles
    // ========================================================================

    /// Keep `value` alive until the handle is released
    pub fn make_handle(&mut self, value: Value) -> Handle {
        self.handles.insert(value)
    }

    /// Value behind a handle
    pub fn handle_value(&self, handle: &Handle) -> Option<Value> {
        self.handles.get(handle)
    }

    /// Release a handle, letting its value be collected
    pub fn release_handle(&mut self, handle: Handle) {
        self.handles.remove(handle);
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Allocate a string
    pub fn new_string(&mut self, text: &str) -> Value {
        self.string_value(text)
    }

    /// Allocate a list holding `elements`
    pub fn new_list(&mut self, elements: Vec<Value>) -> Value {
        Value::from(self.allocate(None, Obj::List(ObjList { elements })))
    }

    /// Allocate an empty map
    pub fn new_map(&mut self) -> Value {
        Value::from(self.allocate(None, Obj::Map(Default::default())))
    }

    /// Text of a string value
    pub fn string_text(&self, value: Value) -> Option<String> {
        self.heap.try_string(value).map(|s| s.to_str_lossy().into_owned())
    }

    /// Elements of a list value
    pub fn list_elements(&self, value: Value) -> Option<&[Value]> {
        self.heap.try_list(value).map(|list| list.elements.as_slice())
    }

    /// `value.toString` as Rust text
    pub fn to_display_string(&mut self, value: Value) -> VmResult<String> {
        if let Some(text) = self.string_text(value) {
            return Ok(text);
        }
        let result = self.call(value, "toString", &[])?;
        Ok(self.string_text(result).unwrap_or_else(|| "[invalid toString]".to_string()))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call method `signature` on `receiver` and run it to completion.
    ///
    /// `signature` is the full method signature, like `"add(_,_)"` or
    /// `"count"`. May be used from inside a foreign method.
    pub fn call(&mut self, receiver: Value, signature: &str, args: &[Value]) -> VmResult<Value> {
        let symbol = self.method_names.ensure(signature);
        let argc = args.len();

        // Arguments are only reachable from here until they are on the stack.
        let roots_base = self.compiler_roots.len();
        self.compiler_roots
            .extend(std::iter::once(receiver).chain(args.iter().copied()).filter_map(Value::try_obj));

        let [hi, lo] = (symbol as u16).to_be_bytes();
        let code = vec![
            Opcode::Call.to_u8(),
            argc as u8,
            hi,
            lo,
            Opcode::Return.to_u8(),
            Opcode::End.to_u8(),
        ];
        let function = self.allocate(
            None,
            Obj::Fn(ObjFn {
                code: Rc::from(code),
                constants: Vec::new(),
                module: self.core_module,
                max_slots: argc + 2,
                num_upvalues: 0,
                arity: 0,
                debug: FnDebug {
                    name: signature.to_string(),
                    source_lines: vec![0; 6],
                },
            }),
        );
        self.compiler_roots.push(function);
        let closure = self.allocate(
            None,
            Obj::Closure(ObjClosure {
                function,
                upvalues: Vec::new(),
                owner: None,
            }),
        );
        self.compiler_roots.push(closure);

        let fiber = self.new_fiber(Some(closure));
        let f = self.heap.fiber_mut(fiber);
        f.push(receiver);
        f.stack.extend_from_slice(args);
        self.compiler_roots.truncate(roots_base);

        let saved_fiber = self.fiber;
        let saved_api = self.api_stack;
        if let Some(outer) = saved_fiber {
            self.suspended_fibers.push(outer);
        }
        self.api_stack = None;

        let result = self.run_interpreter(fiber);

        if saved_fiber.is_some() {
            self.suspended_fibers.pop();
        }
        self.fiber = saved_fiber;
        self.api_stack = saved_api;
        result
    }

    /// Call a method through a handle to the receiver
    pub fn call_handle(&mut self, receiver: &Handle, signature: &str, args: &[Value]) -> VmResult<Value> {
        let receiver = self.handle_value(receiver).ok_or_else(|| VmError::Runtime {
            message: "Handle has been released.".to_string(),
            stack_trace: Vec::new(),
        })?;
        self.call(receiver, signature, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::VmOptions;

    #[test]
    fn test_scratch_slots() {
        let mut vm = Vm::new(VmOptions::default());
        assert_eq!(vm.slot_count(), 0);

        vm.ensure_slots(3);
        assert_eq!(vm.slot_count(), 3);
        assert_eq!(vm.slot_type(2), SlotType::Null);

        vm.set_slot_num(0, 4.5);
        vm.set_slot_string(1, "hi");
        vm.set_slot_bool(2, true);
        assert_eq!(vm.get_slot_num(0), Some(4.5));
        assert_eq!(vm.get_slot_string(1).as_deref(), Some("hi"));
        assert_eq!(vm.slot_type(1), SlotType::String);
        assert_eq!(vm.get_slot_bool(2), Some(true));
        assert_eq!(vm.get_slot_num(1), None);
    }

    #[test]
    fn test_list_slots() {
        let mut vm = Vm::new(VmOptions::default());
        vm.ensure_slots(2);
        vm.set_slot_new_list(0);
        vm.set_slot_num(1, 7.0);
        assert!(vm.list_push(0, 1));
        assert!(vm.list_push(0, 1));
        assert_eq!(vm.list_count(0), Some(2));

        assert!(vm.get_list_element(0, -1, 1));
        assert!(!vm.get_list_element(0, 2, 1));
        assert!(!vm.list_push(1, 1));
    }

    #[test]
    fn test_call_method_from_host() {
        let mut vm = Vm::new(VmOptions::default());
        let list = vm.new_list(vec![Value::num(1.0), Value::num(2.0)]);
        let handle = vm.make_handle(list);

        vm.call(list, "add(_)", &[Value::num(3.0)]).unwrap();
        let count = vm.call_handle(&handle, "count", &[]).unwrap();
        assert_eq!(count, Value::num(3.0));

        let text = vm.to_display_string(list).unwrap();
        assert_eq!(text, "[1, 2, 3]");
        vm.release_handle(handle);
    }

    #[test]
    fn test_call_reports_missing_method() {
        let mut vm = Vm::new(VmOptions::default());
        let err = vm.call(Value::num(1.0), "frobnicate", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Num does not implement 'frobnicate'.");
    }
}
