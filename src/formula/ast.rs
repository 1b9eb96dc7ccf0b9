//! Expression tree: evaluation and canonical reprinting.

use crate::cell::format_number;
use crate::error::FormulaError;
use crate::position::Position;

use super::Lookup;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Expr {
    Number(f64),
    Cell(Position),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

/// Node precedence classes for reprinting. Higher binds tighter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Precedence {
    Add,
    Sub,
    Mul,
    Div,
    Unary,
    Atom,
}

const PAREN_NONE: u8 = 0b00;
const PAREN_LEFT: u8 = 0b01;
const PAREN_RIGHT: u8 = 0b10;
const PAREN_BOTH: u8 = PAREN_LEFT | PAREN_RIGHT;

/// `PAREN_RULES[parent][child]` says whether a child of a given precedence
/// must be parenthesised under that parent, split by left/right slot.
///
/// A pair needs parens exactly when dropping them would change the parse:
/// `A-(B+C)` and `A/(B*C)` do, `A+(B-C)` and `A*(B/C)` do not. A unary
/// operator always parenthesises an additive operand; `+(A+B)/C` is not
/// the same expression as `+A+B/C`.
const PAREN_RULES: [[u8; 6]; 6] = [
    /* Add   */ [PAREN_NONE; 6],
    /* Sub   */
    [
        PAREN_RIGHT,
        PAREN_RIGHT,
        PAREN_NONE,
        PAREN_NONE,
        PAREN_NONE,
        PAREN_NONE,
    ],
    /* Mul   */
    [
        PAREN_BOTH,
        PAREN_BOTH,
        PAREN_NONE,
        PAREN_NONE,
        PAREN_NONE,
        PAREN_NONE,
    ],
    /* Div   */
    [
        PAREN_BOTH,
        PAREN_BOTH,
        PAREN_RIGHT,
        PAREN_RIGHT,
        PAREN_NONE,
        PAREN_NONE,
    ],
    /* Unary */
    [
        PAREN_BOTH,
        PAREN_BOTH,
        PAREN_NONE,
        PAREN_NONE,
        PAREN_NONE,
        PAREN_NONE,
    ],
    /* Atom  */ [PAREN_NONE; 6],
];

impl Expr {
    /// Evaluate the subtree. Cell reads go through `lookup`; any error it
    /// returns propagates unchanged. Every binary result is checked for
    /// finiteness, so overflow and division by zero both surface as `Div0`.
    pub(crate) fn eval(&self, lookup: &Lookup) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Cell(pos) => {
                if !pos.is_valid() {
                    return Err(FormulaError::Ref);
                }
                lookup(*pos)
            }
            Expr::Unary { op, operand } => {
                let value = operand.eval(lookup)?;
                Ok(match op {
                    UnaryOp::Plus => value,
                    UnaryOp::Minus => -value,
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval(lookup)?;
                let rhs = rhs.eval(lookup)?;
                let result = match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => lhs / rhs,
                };
                if result.is_finite() {
                    Ok(result)
                } else {
                    Err(FormulaError::Div0)
                }
            }
        }
    }

    pub(crate) fn precedence(&self) -> Precedence {
        match self {
            Expr::Number(_) | Expr::Cell(_) => Precedence::Atom,
            Expr::Unary { .. } => Precedence::Unary,
            Expr::Binary { op, .. } => match op {
                BinaryOp::Add => Precedence::Add,
                BinaryOp::Sub => Precedence::Sub,
                BinaryOp::Mul => Precedence::Mul,
                BinaryOp::Div => Precedence::Div,
            },
        }
    }

    /// Append the canonical form to `out`: no whitespace, parens only where
    /// `PAREN_RULES` requires them for this parent/slot.
    pub(crate) fn write_canonical(&self, out: &mut String, parent: Precedence, right_slot: bool) {
        let precedence = self.precedence();
        let mask = if right_slot { PAREN_RIGHT } else { PAREN_LEFT };
        let parens = PAREN_RULES[parent as usize][precedence as usize] & mask != 0;
        if parens {
            out.push('(');
        }
        match self {
            Expr::Number(n) => out.push_str(&format_number(*n)),
            Expr::Cell(pos) => {
                if pos.is_valid() {
                    out.push_str(&pos.to_a1());
                } else {
                    out.push_str(&FormulaError::Ref.to_string());
                }
            }
            Expr::Unary { op, operand } => {
                out.push(match op {
                    UnaryOp::Plus => '+',
                    UnaryOp::Minus => '-',
                });
                operand.write_canonical(out, precedence, false);
            }
            Expr::Binary { op, lhs, rhs } => {
                lhs.write_canonical(out, precedence, false);
                out.push(op.symbol());
                rhs.write_canonical(out, precedence, true);
            }
        }
        if parens {
            out.push(')');
        }
    }

    /// Collect every cell reference in the subtree, in occurrence order.
    pub(crate) fn collect_cells(&self, cells: &mut Vec<Position>) {
        match self {
            Expr::Number(_) => {}
            Expr::Cell(pos) => cells.push(*pos),
            Expr::Unary { operand, .. } => operand.collect_cells(cells),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_cells(cells);
                rhs.collect_cells(cells);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Expr {
        Expr::Number(n)
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn canonical(expr: &Expr) -> String {
        let mut out = String::new();
        expr.write_canonical(&mut out, Precedence::Atom, false);
        out
    }

    fn eval(expr: &Expr) -> Result<f64, FormulaError> {
        expr.eval(&|_| Ok(0.0))
    }

    #[test]
    fn test_eval_binary_ops() {
        assert_eq!(eval(&binary(BinaryOp::Add, num(2.0), num(3.0))), Ok(5.0));
        assert_eq!(eval(&binary(BinaryOp::Sub, num(2.0), num(3.0))), Ok(-1.0));
        assert_eq!(eval(&binary(BinaryOp::Mul, num(2.0), num(3.0))), Ok(6.0));
        assert_eq!(eval(&binary(BinaryOp::Div, num(3.0), num(2.0))), Ok(1.5));
    }

    #[test]
    fn test_eval_non_finite_is_div0() {
        let div = binary(BinaryOp::Div, num(1.0), num(0.0));
        assert_eq!(eval(&div), Err(FormulaError::Div0));

        let nan = binary(BinaryOp::Div, num(0.0), num(0.0));
        assert_eq!(eval(&nan), Err(FormulaError::Div0));

        let overflow = binary(BinaryOp::Mul, num(f64::MAX), num(f64::MAX));
        assert_eq!(eval(&overflow), Err(FormulaError::Div0));
    }

    #[test]
    fn test_eval_unary() {
        let neg = Expr::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(num(7.0)),
        };
        assert_eq!(eval(&neg), Ok(-7.0));

        let pos = Expr::Unary {
            op: UnaryOp::Plus,
            operand: Box::new(num(7.0)),
        };
        assert_eq!(eval(&pos), Ok(7.0));
    }

    #[test]
    fn test_eval_invalid_cell_is_ref_error() {
        let expr = Expr::Cell(Position::NONE);
        assert_eq!(eval(&expr), Err(FormulaError::Ref));
    }

    #[test]
    fn test_eval_lookup_error_propagates() {
        let expr = binary(
            BinaryOp::Add,
            num(1.0),
            Expr::Cell(Position::new(0, 0)),
        );
        let result = expr.eval(&|_| Err(FormulaError::Value));
        assert_eq!(result, Err(FormulaError::Value));
    }

    #[test]
    fn test_canonical_parens_sub_rhs() {
        // 1-(2+3) keeps parens, (1-2)+3 does not
        let keep = binary(
            BinaryOp::Sub,
            num(1.0),
            binary(BinaryOp::Add, num(2.0), num(3.0)),
        );
        assert_eq!(canonical(&keep), "1-(2+3)");

        let drop = binary(
            BinaryOp::Add,
            binary(BinaryOp::Sub, num(1.0), num(2.0)),
            num(3.0),
        );
        assert_eq!(canonical(&drop), "1-2+3");
    }

    #[test]
    fn test_canonical_parens_div_rhs() {
        let expr = binary(
            BinaryOp::Div,
            num(1.0),
            binary(BinaryOp::Mul, num(2.0), num(3.0)),
        );
        assert_eq!(canonical(&expr), "1/(2*3)");
    }

    #[test]
    fn test_canonical_parens_unary_operand() {
        let expr = Expr::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(binary(BinaryOp::Add, num(1.0), num(2.0))),
        };
        assert_eq!(canonical(&expr), "-(1+2)");

        let tight = Expr::Unary {
            op: UnaryOp::Minus,
            operand: Box::new(binary(BinaryOp::Mul, num(1.0), num(2.0))),
        };
        assert_eq!(canonical(&tight), "-1*2");
    }

    #[test]
    fn test_canonical_number_formatting() {
        assert_eq!(canonical(&num(3.0)), "3");
        assert_eq!(canonical(&num(0.5)), "0.5");
    }
}
