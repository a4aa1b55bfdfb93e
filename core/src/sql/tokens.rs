/// SQL keywords, operators and punctuation.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    // Statements
    SELECT,
    FROM,
    WHERE,
    INSERT,
    INTO,
    VALUES,
    UPDATE,
    SET,
    DELETE,
    // Joins
    JOIN,
    INNER,
    LEFT,
    RIGHT,
    ON,
    AS,
    // Ordering and pagination
    ORDER,
    BY,
    ASC,
    DESC,
    LIMIT,
    OFFSET,
    // Logical
    AND,
    OR,
    NOT,
    // Predicates
    IN,
    IS,
    NULL,
    LIKE,
    TRUE,
    FALSE,
    MATCH,
    AGAINST,
    BOOLEAN,
    MODE,
    NATURAL,
    LANGUAGE,
    WITH,
    QUERY,
    EXPANSION,
    // Comparison operators
    EQ,
    NE,
    LT,
    LE,
    GT,
    GE,
    // Punctuation
    LPAREN,
    RPAREN,
    COMMA,
    DOT,
    STAR,
}

impl Token {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Token::SELECT => "SELECT",
            Token::FROM => "FROM",
            Token::WHERE => "WHERE",
            Token::INSERT => "INSERT",
            Token::INTO => "INTO",
            Token::VALUES => "VALUES",
            Token::UPDATE => "UPDATE",
            Token::SET => "SET",
            Token::DELETE => "DELETE",
            Token::JOIN => "JOIN",
            Token::INNER => "INNER",
            Token::LEFT => "LEFT",
            Token::RIGHT => "RIGHT",
            Token::ON => "ON",
            Token::AS => "AS",
            Token::ORDER => "ORDER",
            Token::BY => "BY",
            Token::ASC => "ASC",
            Token::DESC => "DESC",
            Token::LIMIT => "LIMIT",
            Token::OFFSET => "OFFSET",
            Token::AND => "AND",
            Token::OR => "OR",
            Token::NOT => "NOT",
            Token::IN => "IN",
            Token::IS => "IS",
            Token::NULL => "NULL",
            Token::LIKE => "LIKE",
            Token::TRUE => "TRUE",
            Token::FALSE => "FALSE",
            Token::MATCH => "MATCH",
            Token::AGAINST => "AGAINST",
            Token::BOOLEAN => "BOOLEAN",
            Token::MODE => "MODE",
            Token::NATURAL => "NATURAL",
            Token::LANGUAGE => "LANGUAGE",
            Token::WITH => "WITH",
            Token::QUERY => "QUERY",
            Token::EXPANSION => "EXPANSION",
            Token::EQ => "=",
            Token::NE => "<>",
            Token::LT => "<",
            Token::LE => "<=",
            Token::GT => ">",
            Token::GE => ">=",
            Token::LPAREN => "(",
            Token::RPAREN => ")",
            Token::COMMA => ",",
            Token::DOT => ".",
            Token::STAR => "*",
        }
    }

    /// Comparison operators get a space on both sides.
    pub const fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::EQ | Token::NE | Token::LT | Token::LE | Token::GT | Token::GE
        )
    }

    /// Punctuation never takes part in word spacing.
    pub const fn is_punctuation(&self) -> bool {
        matches!(
            self,
            Token::LPAREN | Token::RPAREN | Token::COMMA | Token::DOT
        )
    }
}

impl core::fmt::Display for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
