macro_rules! try_or_fail {
    ( $e:expr ) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Control::Exit(e.into()),
        }
    };
}

macro_rules! pop {
    ( $machine:expr, $( $x:ident ),* ) => (
        $(
            let $x = match $machine.stack.pop() {
                Ok(value) => value,
                Err(e) => return Control::Exit(e.into()),
            };
        )*
    );
}

macro_rules! pop_word {
    ( $machine:expr, $( $x:ident ),* ) => (
        $(
            let $x = match $machine.stack.pop() {
                Ok(value) => H256(value.to_big_endian()),
                Err(e) => return Control::Exit(e.into()),
            };
        )*
    );
}

macro_rules! push {
    ( $machine:expr, $( $x:expr ),* ) => (
        $(
            match $machine.stack.push($x) {
                Ok(()) => (),
                Err(e) => return Control::Exit(e.into()),
            }
        )*
    )
}

macro_rules! push_word {
    ( $machine:expr, $( $x:expr ),* ) => (
        $(
            match $machine.stack.push(U256::from_big_endian(&$x[..])) {
                Ok(()) => (),
                Err(e) => return Control::Exit(e.into()),
            }
        )*
    )
}

macro_rules! op2 {
    ( $machine:expr, $op:ident ) => {{
        pop!($machine, op1, op2);
        let ret = op1.$op(op2);
        push!($machine, ret);
        Control::Continue(1)
    }};
}

macro_rules! op2_tuple {
    ( $machine:expr, $op:ident ) => {{
        pop!($machine, op1, op2);
        let (ret, ..) = op1.$op(op2);
        push!($machine, ret);
        Control::Continue(1)
    }};
}

macro_rules! op2_bool {
    ( $machine:expr, $op:ident ) => {{
        use crate::utils::{U256_ONE, U256_ZERO};

        pop!($machine, op1, op2);
        let ret = op1.$op(&op2);
        push!($machine, if ret { U256_ONE } else { U256_ZERO });
        Control::Continue(1)
    }};
}

macro_rules! op1_fn {
    ( $machine:expr, $op:path ) => {{
        pop!($machine, op1);
        let ret = $op(op1);
        push!($machine, ret);
        Control::Continue(1)
    }};
}

macro_rules! op2_fn {
    ( $machine:expr, $op:path ) => {{
        pop!($machine, op1, op2);
        let ret = $op(op1, op2);
        push!($machine, ret);
        Control::Continue(1)
    }};
}

macro_rules! op3_fn {
    ( $machine:expr, $op:path ) => {{
        pop!($machine, op1, op2, op3);
        let ret = $op(op1, op2, op3);
        push!($machine, ret);
        Control::Continue(1)
    }};
}

macro_rules! as_usize_or_fail {
    ( $v:expr ) => {{
        if $v > crate::utils::USIZE_MAX {
            return Control::Exit(ExitError::UsizeOverflow.into());
        }
        $v.as_usize()
    }};

    ( $v:expr, $reason:expr ) => {{
        if $v > crate::utils::USIZE_MAX {
            return Control::Exit($reason.into());
        }
        $v.as_usize()
    }};
}
