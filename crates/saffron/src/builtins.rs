//! The fixed built-in surface (§6): `print`/`println`/`spawn` as free
//! functions, `Task`/`List`/`Map` methods, and `time.clock()`. Grounded on
//! `original_source/src/libc/list.c` (List), `libc/map.c` (Map),
//! `libc/task.c` (Task), and `lib/time.c` (`time.clock`).

use crate::{bytecode::vm::Vm, heap::HeapObject, value::Value};

type NativeResult = Result<Value, String>;

fn type_error(message: impl Into<String>) -> String {
    message.into()
}

pub fn print(vm: &mut Vm, args: &[Value]) -> NativeResult {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            vm.print_str(" ");
        }
        vm.print_value(arg);
    }
    Ok(Value::Nil)
}

pub fn println(vm: &mut Vm, args: &[Value]) -> NativeResult {
    print(vm, args)?;
    vm.print_str("\n");
    Ok(Value::Nil)
}

/// `spawn(fn) -> Task` (§4.7). Creates a new call frame for `fn` with no
/// arguments evaluated yet — the scheduler gives it its first time slice the
/// next time the run loop round-robins to it.
pub fn spawn(vm: &mut Vm, args: &[Value]) -> NativeResult {
    let closure = match args.first() {
        Some(Value::Obj(id)) if matches!(vm.heap().get(*id), HeapObject::Closure(_)) => *id,
        _ => return Err(type_error("spawn() expects a function")),
    };
    Ok(vm.spawn_task(closure))
}

pub fn task_get_result(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("Task.getResult() called on non-Task")) };
    vm.task_result(id)
}

pub fn task_is_ready(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("Task.isReady() called on non-Task")) };
    Ok(Value::Bool(vm.task_is_ready(id)))
}

pub fn list_length(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("List.length() called on non-List")) };
    match vm.heap().get(id) {
        HeapObject::List(items) => Ok(Value::Number(items.len() as f64)),
        _ => Err(type_error("List.length() called on non-List")),
    }
}

pub fn list_push(vm: &mut Vm, receiver: Value, args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("List.push() called on non-List")) };
    let item = *args.first().unwrap_or(&Value::Nil);
    match vm.heap_mut().get_mut(id) {
        HeapObject::List(items) => items.push(item),
        _ => return Err(type_error("List.push() called on non-List")),
    }
    Ok(Value::Nil)
}

pub fn list_pop(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("List.pop() called on non-List")) };
    match vm.heap_mut().get_mut(id) {
        HeapObject::List(items) => Ok(items.pop().unwrap_or(Value::Nil)),
        _ => Err(type_error("List.pop() called on non-List")),
    }
}

pub fn list_reverse(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("List.reverse() called on non-List")) };
    match vm.heap_mut().get_mut(id) {
        HeapObject::List(items) => items.reverse(),
        _ => return Err(type_error("List.reverse() called on non-List")),
    }
    Ok(receiver)
}

pub fn list_copy(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("List.copy() called on non-List")) };
    let items = match vm.heap().get(id) {
        HeapObject::List(items) => items.clone(),
        _ => return Err(type_error("List.copy() called on non-List")),
    };
    Ok(Value::Obj(vm.heap_mut().allocate(HeapObject::List(items))))
}

pub fn list_sort(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("List.sort() called on non-List")) };
    let mut items = match vm.heap().get(id) {
        HeapObject::List(items) => items.clone(),
        _ => return Err(type_error("List.sort() called on non-List")),
    };
    for item in &items {
        if item.as_number().is_none() {
            return Err(type_error("List.sort() requires every element to be a Number"));
        }
    }
    items.sort_by(|a, b| a.as_number().unwrap().total_cmp(&b.as_number().unwrap()));
    match vm.heap_mut().get_mut(id) {
        HeapObject::List(slot) => *slot = items,
        _ => unreachable!(),
    }
    Ok(receiver)
}

pub fn map_keys(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("Map.keys() called on non-Map")) };
    let keys: Vec<Value> = match vm.heap().get(id) {
        HeapObject::Map(map) => map.keys().collect(),
        _ => return Err(type_error("Map.keys() called on non-Map")),
    };
    Ok(Value::Obj(vm.heap_mut().allocate(HeapObject::List(keys))))
}

pub fn map_values(vm: &mut Vm, receiver: Value, _args: &[Value]) -> NativeResult {
    let Value::Obj(id) = receiver else { return Err(type_error("Map.values() called on non-Map")) };
    let values: Vec<Value> = match vm.heap().get(id) {
        HeapObject::Map(map) => map.values().collect(),
        _ => return Err(type_error("Map.values() called on non-Map")),
    };
    Ok(Value::Obj(vm.heap_mut().allocate(HeapObject::List(values))))
}

/// `time.clock() -> Number`, monotonic seconds since process start
/// (`original_source/src/lib/time.c`'s `getTime()`, backed there by
/// `clock()`/`CLOCKS_PER_SEC`). Saffron uses `Instant` instead of a libc
/// clock for the same monotonic-seconds contract without `unsafe` FFI.
///
/// Bound as a property of the `time` namespace value rather than a bare
/// global, so the member-access signature takes a (now-unused) receiver to
/// match `NativeMethodFn` the way `List`/`Map`/`Task` methods do.
pub fn time_clock(vm: &mut Vm, _receiver: Value, _args: &[Value]) -> NativeResult {
    Ok(Value::Number(vm.process_start().elapsed().as_secs_f64()))
}

