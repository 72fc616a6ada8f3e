//! Interpreted prelude
//!
//! Routines the calls-lox natives hand their work to. They are assembled
//! directly into bytecode and bound to globals, so higher-order calls like
//! `array.map(f)` run `f` on the interpreter's own frames. Each routine
//! takes the native's receiver as its first parameter.

use bytecode_system::{ChunkError, OpCode};
use core_types::Value;
use interpreter::{FunctionBuilder, Vm};
use memory_manager::{Closure, Object};

pub(crate) fn install(vm: &mut Vm) -> Result<(), ChunkError> {
    define(vm, "_array_filter", array_filter())?;
    define(vm, "_array_map", array_map())?;
    define(vm, "_array_foreach", array_foreach())?;
    define(vm, "_array_slice", array_slice())?;
    define(vm, "_string_replace", string_replace())?;
    Ok(())
}

fn define(vm: &mut Vm, name: &str, routine: FunctionBuilder) -> Result<(), ChunkError> {
    let function = routine.build(vm)?;
    let mut vm = vm.pin(Value::object(function));
    let closure = vm.alloc(Object::Closure(Closure {
        function,
        upvalues: Box::new([]),
    }));
    vm.define_global(name, Value::object(closure));
    log::debug!("defined prelude routine {}", name);
    Ok(())
}

// ── loop helpers ───────────────────────────────────────────────────

/// `while (index < bound) { body; index = index + 1; }`
///
/// The counter must already occupy local `index`; it is left in place.
fn count_up(
    f: &mut FunctionBuilder,
    index: u8,
    bound: impl FnOnce(&mut FunctionBuilder),
    body: impl FnOnce(&mut FunctionBuilder),
) {
    let start = f.current_offset();
    f.get_local(index);
    bound(f);
    f.op(OpCode::Less);
    let exit = f.jump_if_false();
    f.op(OpCode::Pop);
    body(f);
    f.get_local(index)
        .number(1.0)
        .op(OpCode::Add)
        .set_local(index)
        .op(OpCode::Pop)
        .loop_to(start);
    f.bind(exit).op(OpCode::Pop);
}

/// Runs `body` once per element of the array in local `array`, with the
/// counter in local `index` and the element in the local after it
fn each_item(f: &mut FunctionBuilder, array: u8, index: u8, body: impl FnOnce(&mut FunctionBuilder, u8)) {
    f.number(0.0);
    count_up(
        f,
        index,
        |f| {
            f.get_local(array).invoke("count", 0);
        },
        |f| {
            f.get_local(array).get_local(index).invoke("get", 1);
            body(f, index + 1);
            f.op(OpCode::Pop);
        },
    );
}

/// `if (test) assign;` where `test` leaves one value and `assign` is
/// stack-neutral
fn when(f: &mut FunctionBuilder, test: impl FnOnce(&mut FunctionBuilder), assign: impl FnOnce(&mut FunctionBuilder)) {
    test(f);
    let skip = f.jump_if_false();
    f.op(OpCode::Pop);
    assign(f);
    let done = f.jump();
    f.bind(skip).op(OpCode::Pop).bind(done);
}

// ── routines ───────────────────────────────────────────────────────

/// `_array_filter(array, predicate)`
fn array_filter() -> FunctionBuilder {
    let mut f = FunctionBuilder::new("_array_filter", 2);
    f.get_global("Array").call(0);
    each_item(&mut f, 1, 4, |f, item| {
        when(
            f,
            |f| {
                f.get_local(2).get_local(item).call(1);
            },
            |f| {
                f.get_local(3).get_local(item).invoke("push", 1).op(OpCode::Pop);
            },
        );
    });
    f.get_local(3).op(OpCode::Return);
    f
}

/// `_array_map(array, transform)`
fn array_map() -> FunctionBuilder {
    let mut f = FunctionBuilder::new("_array_map", 2);
    f.get_global("Array").call(0);
    each_item(&mut f, 1, 4, |f, item| {
        f.get_local(3)
            .get_local(2)
            .get_local(item)
            .call(1)
            .invoke("push", 1)
            .op(OpCode::Pop);
    });
    f.get_local(3).op(OpCode::Return);
    f
}

/// `_array_foreach(array, action)`
fn array_foreach() -> FunctionBuilder {
    let mut f = FunctionBuilder::new("_array_foreach", 2);
    each_item(&mut f, 1, 3, |f, item| {
        f.get_local(2).get_local(item).call(1).op(OpCode::Pop);
    });
    f.ret_nil();
    f
}

/// `_array_slice(array, start, end)`: elements `start <= i < end`, with
/// both bounds clamped to the array
fn array_slice() -> FunctionBuilder {
    let mut f = FunctionBuilder::new("_array_slice", 3);
    when(
        &mut f,
        |f| {
            f.get_local(1).invoke("count", 0).get_local(3).op(OpCode::Less);
        },
        |f| {
            f.get_local(1).invoke("count", 0).set_local(3).op(OpCode::Pop);
        },
    );
    when(
        &mut f,
        |f| {
            f.get_local(2).number(0.0).op(OpCode::Less);
        },
        |f| {
            f.number(0.0).set_local(2).op(OpCode::Pop);
        },
    );
    f.get_global("Array").call(0);
    f.get_local(2);
    count_up(
        &mut f,
        5,
        |f| {
            f.get_local(3);
        },
        |f| {
            f.get_local(4)
                .get_local(1)
                .get_local(5)
                .invoke("get", 1)
                .invoke("push", 1)
                .op(OpCode::Pop);
        },
    );
    f.get_local(4).op(OpCode::Return);
    f
}

/// `_string_replace(string, needle, replacement)`: replaces every
/// occurrence, scanning left to right; an empty needle leaves the string
/// unchanged
fn string_replace() -> FunctionBuilder {
    let mut f = FunctionBuilder::new("_string_replace", 3);
    f.get_local(2).invoke("length", 0).number(0.0).op(OpCode::Equal);
    let search = f.jump_if_false();
    f.op(OpCode::Pop).get_local(1).op(OpCode::Return);
    f.bind(search).op(OpCode::Pop);

    // result, rest, at
    f.string("").get_local(1).op(OpCode::Nil);
    let start = f.current_offset();
    f.get_local(5)
        .get_local(2)
        .invoke("find", 1)
        .set_local(6)
        .op(OpCode::Pop);
    f.get_local(6).op(OpCode::Nil).op(OpCode::Equal);
    let found = f.jump_if_false();
    f.op(OpCode::Pop).get_local(4).get_local(5).op(OpCode::Add).op(OpCode::Return);
    f.bind(found).op(OpCode::Pop);

    // result = result + rest.substring(0, at) + replacement
    f.get_local(4)
        .get_local(5)
        .number(0.0)
        .get_local(6)
        .invoke("substring", 2)
        .op(OpCode::Add)
        .get_local(3)
        .op(OpCode::Add)
        .set_local(4)
        .op(OpCode::Pop);
    // rest = rest.substring(at + needle.length(), rest.length())
    f.get_local(5)
        .get_local(6)
        .get_local(2)
        .invoke("length", 0)
        .op(OpCode::Add)
        .get_local(5)
        .invoke("length", 0)
        .invoke("substring", 2)
        .set_local(5)
        .op(OpCode::Pop);
    f.loop_to(start);
    f
}
