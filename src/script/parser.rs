//! Script parser (§4.6).
//!
//! A hand-written recursive-descent / precedence-climbing parser matching
//! PyKotor's PLY `yacc` grammar (`resource/formats/ncs/compiler/parser.py`)
//! in shape — same top-level productions
//! (`p_code_root`, `p_struct_definition`, `p_function_definition`, …), same
//! precedence table — expressed without a parser-generator dependency,
//! since the pack shows no `ply`-equivalent Rust crate in use anywhere.

use crate::error::{Error, Result};
use crate::script::ast::*;
use crate::script::lexer::{Lexer, PositionedToken, Token};

pub struct Parser
{
	tokens: Vec<PositionedToken>,
	position: usize,
}

impl Parser
{
	pub fn new(source: &str) -> Result<Self>
	{
		let tokens = Lexer::new(source).tokenize()?;
		return Ok(Self { tokens, position: 0 });
	}

	pub fn parse(source: &str) -> Result<CodeRoot>
	{
		return Self::new(source)?.parseCodeRoot();
	}

	fn current(&self) -> &PositionedToken
	{
		return &self.tokens[self.position.min(self.tokens.len() - 1)];
	}

	fn peekToken(&self) -> &Token
	{
		return &self.current().token;
	}

	fn advance(&mut self) -> PositionedToken
	{
		let token = self.current().clone();
		if self.position < self.tokens.len() - 1
		{
			self.position += 1;
		}
		return token;
	}

	fn expect(&mut self, expected: Token) -> Result<PositionedToken>
	{
		if *self.peekToken() == expected
		{
			return Ok(self.advance());
		}
		let found = self.current().clone();
		return Err(Error::compileError(found.line, found.lexeme, format!("expected {expected:?}, found {:?}", found.token)));
	}

	fn expectIdentifier(&mut self) -> Result<String>
	{
		match self.peekToken().clone()
		{
			Token::Identifier(name) =>
			{
				self.advance();
				return Ok(name);
			},
			other =>
			{
				let token = self.current().clone();
				return Err(Error::compileError(token.line, token.lexeme, format!("expected identifier, found {other:?}")));
			},
		}
	}

	fn errorHere(&self, message: impl Into<String>) -> Error
	{
		let token = self.current();
		return Error::compileError(token.line, token.lexeme.clone(), message.into());
	}

	// -- Top level -----------------------------------------------------

	pub fn parseCodeRoot(&mut self) -> Result<CodeRoot>
	{
		let mut root = CodeRoot::default();
		while *self.peekToken() != Token::Eof
		{
			root.objects.push(self.parseTopLevel()?);
		}
		return Ok(root);
	}

	fn parseTopLevel(&mut self) -> Result<TopLevel>
	{
		if *self.peekToken() == Token::Include
		{
			self.advance();
			let path = match self.advance().token
			{
				Token::StringLiteral(value) => value,
				other => return Err(self.errorHereWith(format!("expected string literal after #include, found {other:?}"))),
			};
			return Ok(TopLevel::Include(path));
		}

		if *self.peekToken() == Token::Struct
		{
			return Ok(TopLevel::Struct(self.parseStructDefinition()?));
		}

		let dataType = self.parseDataType()?;
		let name = self.expectIdentifier()?;

		if *self.peekToken() == Token::LParen
		{
			let parameters = self.parseParameterList()?;
			if *self.peekToken() == Token::Semicolon
			{
				self.advance();
				return Ok(TopLevel::ForwardDeclaration(FunctionForwardDeclaration { returnType: dataType, name, parameters }));
			}
			self.expect(Token::LBrace)?;
			let body = self.parseStatementsUntil(Token::RBrace)?;
			self.expect(Token::RBrace)?;
			return Ok(TopLevel::Function(FunctionDefinition { returnType: dataType, name, parameters, body }));
		}

		if *self.peekToken() == Token::Equal
		{
			self.advance();
			let initializer = self.parseExpression()?;
			self.expect(Token::Semicolon)?;
			return Ok(TopLevel::Global(GlobalVariable { dataType, name, initializer: Some(initializer) }));
		}
		self.expect(Token::Semicolon)?;
		return Ok(TopLevel::Global(GlobalVariable { dataType, name, initializer: None }));
	}

	fn errorHereWith(&self, message: String) -> Error
	{
		return self.errorHere(message);
	}

	fn parseStructDefinition(&mut self) -> Result<StructDefinition>
	{
		self.expect(Token::Struct)?;
		let name = self.expectIdentifier()?;
		self.expect(Token::LBrace)?;

		let mut members = Vec::new();
		while *self.peekToken() != Token::RBrace
		{
			let dataType = self.parseDataType()?;
			let memberName = self.expectIdentifier()?;
			self.expect(Token::Semicolon)?;
			members.push(StructMember { dataType, name: memberName });
		}
		self.expect(Token::RBrace)?;
		self.expect(Token::Semicolon)?;

		return Ok(StructDefinition { name, members });
	}

	fn parseDataType(&mut self) -> Result<DataType>
	{
		let dataType = match self.peekToken().clone()
		{
			Token::Int => DataType::Int,
			Token::Float => DataType::Float,
			Token::Object => DataType::Object,
			Token::Void => DataType::Void,
			Token::Event => DataType::Event,
			Token::Effect => DataType::Effect,
			Token::ItemProperty => DataType::ItemProperty,
			Token::Location => DataType::Location,
			Token::String => DataType::String,
			Token::Talent => DataType::Talent,
			Token::Vector => DataType::Vector,
			Token::Action => DataType::Action,
			Token::Struct =>
			{
				self.advance();
				let name = self.expectIdentifier()?;
				return Ok(DataType::Struct(name));
			},
			other => return Err(self.errorHereWith(format!("expected a data type, found {other:?}"))),
		};
		self.advance();
		return Ok(dataType);
	}

	fn parseParameterList(&mut self) -> Result<Vec<Parameter>>
	{
		self.expect(Token::LParen)?;
		let mut parameters = Vec::new();
		let mut sawDefault = false;

		while *self.peekToken() != Token::RParen
		{
			if !parameters.is_empty()
			{
				self.expect(Token::Comma)?;
			}
			let dataType = self.parseDataType()?;
			let name = self.expectIdentifier()?;
			let default = if *self.peekToken() == Token::Equal
			{
				self.advance();
				sawDefault = true;
				Some(self.parseExpression()?)
			}
			else
			{
				if sawDefault
				{
					return Err(self.errorHereWith("parameter without a default may not follow one that has one"));
				}
				None
			};
			parameters.push(Parameter { dataType, name, default });
		}
		self.expect(Token::RParen)?;
		return Ok(parameters);
	}

	// -- Statements ------------------------------------------------------

	fn parseStatementsUntil(&mut self, terminator: Token) -> Result<Vec<Statement>>
	{
		let mut statements = Vec::new();
		while *self.peekToken() != terminator
		{
			statements.push(self.parseStatement()?);
		}
		return Ok(statements);
	}

	/// A brace-delimited block, or (per §4.6 "accept either a brace-delimited
	/// block or a single statement") exactly one statement.
	fn parseBlockOrStatement(&mut self) -> Result<Vec<Statement>>
	{
		if *self.peekToken() == Token::LBrace
		{
			self.advance();
			let statements = self.parseStatementsUntil(Token::RBrace)?;
			self.expect(Token::RBrace)?;
			return Ok(statements);
		}
		return Ok(vec![self.parseStatement()?]);
	}

	fn parseStatement(&mut self) -> Result<Statement>
	{
		match self.peekToken().clone()
		{
			Token::Semicolon =>
			{
				self.advance();
				return Ok(Statement::Empty);
			},
			Token::LBrace =>
			{
				self.advance();
				let statements = self.parseStatementsUntil(Token::RBrace)?;
				self.expect(Token::RBrace)?;
				return Ok(Statement::Scoped(statements));
			},
			Token::If => return Ok(Statement::If(self.parseConditional()?)),
			Token::While =>
			{
				self.advance();
				self.expect(Token::LParen)?;
				let condition = self.parseExpression()?;
				self.expect(Token::RParen)?;
				let body = self.parseBlockOrStatement()?;
				return Ok(Statement::While { condition, body });
			},
			Token::Do =>
			{
				self.advance();
				let body = self.parseBlockOrStatement()?;
				self.expect(Token::While)?;
				self.expect(Token::LParen)?;
				let condition = self.parseExpression()?;
				self.expect(Token::RParen)?;
				self.expect(Token::Semicolon)?;
				return Ok(Statement::DoWhile { condition, body });
			},
			Token::For =>
			{
				self.advance();
				self.expect(Token::LParen)?;
				let initializer = self.parseExpression()?;
				self.expect(Token::Semicolon)?;
				let condition = self.parseExpression()?;
				self.expect(Token::Semicolon)?;
				let increment = self.parseExpression()?;
				self.expect(Token::RParen)?;
				let body = self.parseBlockOrStatement()?;
				return Ok(Statement::For { initializer, condition, increment, body });
			},
			Token::Switch => return self.parseSwitch(),
			Token::Break =>
			{
				self.advance();
				self.expect(Token::Semicolon)?;
				return Ok(Statement::Break);
			},
			Token::Continue =>
			{
				self.advance();
				self.expect(Token::Semicolon)?;
				return Ok(Statement::Continue);
			},
			Token::Return =>
			{
				self.advance();
				if *self.peekToken() == Token::Semicolon
				{
					self.advance();
					return Ok(Statement::Return(None));
				}
				let value = self.parseExpression()?;
				self.expect(Token::Semicolon)?;
				return Ok(Statement::Return(Some(value)));
			},
			token if isDataTypeStart(&token) =>
			{
				let dataType = self.parseDataType()?;
				let name = self.expectIdentifier()?;
				if *self.peekToken() == Token::Equal
				{
					self.advance();
					let initializer = self.parseExpression()?;
					self.expect(Token::Semicolon)?;
					return Ok(Statement::Declaration { dataType, name, initializer: Some(initializer) });
				}
				self.expect(Token::Semicolon)?;
				return Ok(Statement::Declaration { dataType, name, initializer: None });
			},
			_ =>
			{
				let expression = self.parseExpression()?;
				self.expect(Token::Semicolon)?;
				return Ok(Statement::Expression(expression));
			},
		}
	}

	fn parseConditional(&mut self) -> Result<ConditionalBlock>
	{
		let mut branches = vec![self.parseConditionAndBlock()?];
		let mut elseBody = None;

		loop
		{
			if *self.peekToken() == Token::Else
			{
				self.advance();
				if *self.peekToken() == Token::If
				{
					branches.push(self.parseConditionAndBlock()?);
					continue;
				}
				elseBody = Some(self.parseBlockOrStatement()?);
			}
			break;
		}

		return Ok(ConditionalBlock { branches, elseBody });
	}

	fn parseConditionAndBlock(&mut self) -> Result<ConditionAndBlock>
	{
		self.expect(Token::If)?;
		self.expect(Token::LParen)?;
		let condition = self.parseExpression()?;
		self.expect(Token::RParen)?;
		let body = self.parseBlockOrStatement()?;
		return Ok(ConditionAndBlock { condition, body });
	}

	fn parseSwitch(&mut self) -> Result<Statement>
	{
		self.expect(Token::Switch)?;
		self.expect(Token::LParen)?;
		let subject = self.parseExpression()?;
		self.expect(Token::RParen)?;
		self.expect(Token::LBrace)?;

		let mut blocks = Vec::new();
		while *self.peekToken() != Token::RBrace
		{
			let mut labels = Vec::new();
			loop
			{
				match self.peekToken().clone()
				{
					Token::Case =>
					{
						self.advance();
						let value = self.parseExpression()?;
						self.expect(Token::Colon)?;
						labels.push(SwitchLabel { value: Some(value) });
					},
					Token::Default =>
					{
						self.advance();
						self.expect(Token::Colon)?;
						labels.push(SwitchLabel { value: None });
					},
					_ => break,
				}
			}
			let mut statements = Vec::new();
			while !matches!(self.peekToken(), Token::Case | Token::Default | Token::RBrace)
			{
				statements.push(self.parseStatement()?);
			}
			blocks.push(SwitchBlock { labels, statements });
		}
		self.expect(Token::RBrace)?;

		return Ok(Statement::Switch { subject, blocks });
	}

	// -- Expressions (precedence climbing, §4.6) --------------------------
	//
	// lowest → highest: `||`; `&&`; `|`; `^`; `&`; `== !=`; `< <= > >=`;
	// `<< >>`; `+ -`; `* / %`; unary `~ ! -`; pre/postfix `++ --`.

	pub fn parseExpression(&mut self) -> Result<Expression>
	{
		return self.parseAssignment();
	}

	fn parseAssignment(&mut self) -> Result<Expression>
	{
		let left = self.parseBinary(0)?;

		let operator = match self.peekToken()
		{
			Token::Equal => None,
			Token::PlusEqual => Some(CompoundAssignmentOperator::Add),
			Token::MinusEqual => Some(CompoundAssignmentOperator::Subtract),
			Token::StarEqual => Some(CompoundAssignmentOperator::Multiply),
			Token::SlashEqual => Some(CompoundAssignmentOperator::Divide),
			_ => return Ok(left),
		};

		let target = fieldAccessOf(&left).ok_or_else(|| self.errorHere("left-hand side of assignment is not assignable"))?;
		self.advance();
		let value = self.parseAssignment()?;

		return Ok(match operator
		{
			None => Expression::Assignment { target, value: Box::new(value) },
			Some(operator) => Expression::CompoundAssignment { target, operator, value: Box::new(value) },
		});
	}

	const PRECEDENCE_LEVELS: usize = 8;

	fn parseBinary(&mut self, level: usize) -> Result<Expression>
	{
		if level >= Self::PRECEDENCE_LEVELS
		{
			return self.parseUnary();
		}

		let mut left = self.parseBinary(level + 1)?;
		while let Some(operator) = binaryOperatorAt(self.peekToken(), level)
		{
			self.advance();
			let right = self.parseBinary(level + 1)?;
			left = Expression::Binary(operator, Box::new(left), Box::new(right));
		}
		return Ok(left);
	}

	fn parseUnary(&mut self) -> Result<Expression>
	{
		let operator = match self.peekToken()
		{
			Token::Minus => Some(UnaryOperator::Negate),
			Token::Tilde => Some(UnaryOperator::BitwiseNot),
			Token::Bang => Some(UnaryOperator::LogicalNot),
			_ => None,
		};
		if let Some(operator) = operator
		{
			self.advance();
			let operand = self.parseUnary()?;
			return Ok(Expression::Unary(operator, Box::new(operand)));
		}
		return self.parsePostfix();
	}

	fn parsePostfix(&mut self) -> Result<Expression>
	{
		let expression = self.parsePrimary()?;

		match self.peekToken()
		{
			Token::PlusPlus | Token::MinusMinus if fieldAccessOf(&expression).is_some() =>
			{
				let operator = if *self.peekToken() == Token::PlusPlus { IncrementDecrementOperator::PostIncrement } else { IncrementDecrementOperator::PostDecrement };
				self.advance();
				return Ok(Expression::IncrementDecrement { target: fieldAccessOf(&expression).unwrap(), operator });
			},
			_ => return Ok(expression),
		}
	}

	fn parsePrimary(&mut self) -> Result<Expression>
	{
		match self.peekToken().clone()
		{
			Token::PlusPlus | Token::MinusMinus =>
			{
				let isIncrement = *self.peekToken() == Token::PlusPlus;
				self.advance();
				let operand = self.parsePostfix()?;
				let target = fieldAccessOf(&operand).ok_or_else(|| self.errorHere("operand of ++/-- is not assignable"))?;
				let operator = if isIncrement { IncrementDecrementOperator::PreIncrement } else { IncrementDecrementOperator::PreDecrement };
				return Ok(Expression::IncrementDecrement { target, operator });
			},
			Token::IntLiteral(value) =>
			{
				self.advance();
				return Ok(Expression::IntegerLiteral(value));
			},
			Token::FloatLiteral(value) =>
			{
				self.advance();
				return Ok(Expression::FloatLiteral(value));
			},
			Token::StringLiteral(value) =>
			{
				self.advance();
				return Ok(Expression::StringLiteral(value));
			},
			Token::True | Token::ObjectSelf =>
			{
				self.advance();
				return Ok(Expression::IntegerLiteral(1));
			},
			Token::False =>
			{
				self.advance();
				return Ok(Expression::IntegerLiteral(0));
			},
			Token::ObjectInvalid =>
			{
				self.advance();
				return Ok(Expression::IntegerLiteral(-1));
			},
			Token::LParen =>
			{
				self.advance();
				let inner = self.parseExpression()?;
				self.expect(Token::RParen)?;
				return Ok(inner);
			},
			Token::LBracket =>
			{
				self.advance();
				let x = self.parseExpression()?;
				self.expect(Token::Comma)?;
				let y = self.parseExpression()?;
				self.expect(Token::Comma)?;
				let z = self.parseExpression()?;
				self.expect(Token::RBracket)?;
				return Ok(Expression::VectorLiteral(Box::new(x), Box::new(y), Box::new(z)));
			},
			Token::Identifier(name) =>
			{
				self.advance();
				if *self.peekToken() == Token::LParen
				{
					let arguments = self.parseArgumentList()?;
					return Ok(Expression::Call { name, arguments });
				}

				let mut path = vec![name];
				while *self.peekToken() == Token::Dot
				{
					self.advance();
					path.push(self.expectIdentifier()?);
				}
				return Ok(Expression::FieldAccess(FieldAccess { path }));
			},
			other => return Err(self.errorHereWith(format!("unexpected token in expression: {other:?}"))),
		}
	}

	fn parseArgumentList(&mut self) -> Result<Vec<Expression>>
	{
		self.expect(Token::LParen)?;
		let mut arguments = Vec::new();
		while *self.peekToken() != Token::RParen
		{
			if !arguments.is_empty()
			{
				self.expect(Token::Comma)?;
			}
			arguments.push(self.parseExpression()?);
		}
		self.expect(Token::RParen)?;
		return Ok(arguments);
	}
}

fn isDataTypeStart(token: &Token) -> bool
{
	return matches!(
		token,
		Token::Int | Token::Float | Token::Object | Token::Void | Token::Event | Token::Effect | Token::ItemProperty | Token::Location | Token::String | Token::Talent | Token::Vector | Token::Action | Token::Struct
	);
}

fn fieldAccessOf(expression: &Expression) -> Option<FieldAccess>
{
	return match expression
	{
		Expression::FieldAccess(access) => Some(access.clone()),
		_ => None,
	};
}

fn binaryOperatorAt(token: &Token, level: usize) -> Option<BinaryOperator>
{
	return match (level, token)
	{
		(0, Token::OrOr) => Some(BinaryOperator::LogicalOr),
		(1, Token::AndAnd) => Some(BinaryOperator::LogicalAnd),
		(2, Token::Pipe) => Some(BinaryOperator::BitwiseOr),
		(3, Token::Caret) => Some(BinaryOperator::BitwiseXor),
		(4, Token::Amp) => Some(BinaryOperator::BitwiseAnd),
		(5, Token::EqualEqual) => Some(BinaryOperator::Equal),
		(5, Token::NotEqual) => Some(BinaryOperator::NotEqual),
		(6, Token::Greater) => Some(BinaryOperator::Greater),
		(6, Token::GreaterEqual) => Some(BinaryOperator::GreaterEqual),
		(6, Token::Less) => Some(BinaryOperator::Less),
		(6, Token::LessEqual) => Some(BinaryOperator::LessEqual),
		(7, Token::ShiftLeft) => Some(BinaryOperator::ShiftLeft),
		(7, Token::ShiftRight) => Some(BinaryOperator::ShiftRight),
		_ => None,
	};
}

#[cfg(test)]
mod tests
{
	use super::*;

	#[test]
	fn ParsesSimpleFunctionWithReturnStatement()
	{
		let root = Parser::parse("int main() { return 1 + 2; }").unwrap();
		assert_eq!(1, root.objects.len());
		match &root.objects[0]
		{
			TopLevel::Function(function) =>
			{
				assert_eq!("main", function.name);
				assert_eq!(1, function.body.len());
			},
			other => panic!("expected function, got {other:?}"),
		}
	}

	#[test]
	fn PrecedenceBindsMultiplicationTighterThanAddition()
	{
		let root = Parser::parse("int f() { return 1 + 2 * 3; }").unwrap();
		let TopLevel::Function(function) = &root.objects[0] else { panic!() };
		let Statement::Return(Some(Expression::Binary(BinaryOperator::Add, _, right))) = &function.body[0] else { panic!() };
		assert!(matches!(**right, Expression::Binary(BinaryOperator::Multiply, _, _)));
	}

	#[test]
	fn ParameterWithoutDefaultAfterDefaultIsRejected()
	{
		let error = Parser::parse("void f(int a = 1, int b) { }").unwrap_err();
		assert!(error.to_string().contains("default"));
	}

	#[test]
	fn SwitchParsesFallThroughLabels()
	{
		let root = Parser::parse("void f() { switch (1) { case 1: case 2: break; default: break; } }").unwrap();
		let TopLevel::Function(function) = &root.objects[0] else { panic!() };
		let Statement::Switch { blocks, .. } = &function.body[0] else { panic!() };
		assert_eq!(2, blocks.len());
		assert_eq!(2, blocks[0].labels.len());
	}

	#[test]
	fn IfElseIfElseChainParses()
	{
		let root = Parser::parse("void f() { if (1) { } else if (2) { } else { } }").unwrap();
		let TopLevel::Function(function) = &root.objects[0] else { panic!() };
		let Statement::If(conditional) = &function.body[0] else { panic!() };
		assert_eq!(2, conditional.branches.len());
		assert!(conditional.elseBody.is_some());
	}
}
